use crate::key::NodeKey;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Invalid field `{field}` on {node_type} node")]
    InvalidField { node_type: String, field: String },

    #[error("Document root must have type `root`, found `{0}`")]
    InvalidRoot(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Node {child} is not listed in the children of its parent {parent}")]
    ParentMismatch { child: NodeKey, parent: NodeKey },

    #[error("Node {0} appears more than once in the tree")]
    DuplicateChild(NodeKey),

    #[error("Node {0} is detached from the root")]
    Detached(NodeKey),

    #[error("Cycle detected at node {0}")]
    CycleDetected(NodeKey),

    #[error("Selection point references missing node {0}")]
    InvalidPoint(NodeKey),

    #[error("Selection point offset {offset} is out of range for node {key}")]
    PointOutOfRange { key: NodeKey, offset: usize },

    #[error("Node {0} is not a table")]
    NotATable(NodeKey),

    #[error("Node {0} is not a table cell")]
    NotATableCell(NodeKey),
}

impl ModelError {
    pub fn invalid_field(node_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidField {
            node_type: node_type.into(),
            field: field.into(),
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Malformed(e.to_string())
    }
}
