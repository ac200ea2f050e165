//! Error types for the editor

use thiserror::Error;
use verso_model::{ModelError, NodeKey};
use verso_reconciler::ReconcileError;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Node {0} is not an element")]
    NotAnElement(NodeKey),

    #[error("Node {0} is not text")]
    NotText(NodeKey),

    #[error("Node {0} has no parent")]
    NoParent(NodeKey),

    #[error("Inserting {0} would create a cycle")]
    CycleDetected(NodeKey),

    #[error("The root node cannot be removed or replaced")]
    RootRemoval,

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Operation requires a range selection")]
    NoRangeSelection,

    #[error("Node transforms did not settle after {iterations} passes")]
    TransformNonTermination { iterations: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Update failed: {0}")]
    Mutator(String),
}

impl EditorError {
    /// Error raised from user code inside an update
    pub fn mutator(message: impl Into<String>) -> Self {
        EditorError::Mutator(message.into())
    }

    pub fn structure(message: impl Into<String>) -> Self {
        EditorError::InvalidStructure(message.into())
    }
}
