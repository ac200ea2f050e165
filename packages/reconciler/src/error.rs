use crate::dom::DomId;
use thiserror::Error;
use verso_model::{ModelError, NodeKey};

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("Unknown DOM node {0}")]
    UnknownDomNode(DomId),

    #[error("DOM node {0} is not an element")]
    NotAnElement(DomId),

    #[error("DOM node {0} is not a text node")]
    NotText(DomId),

    #[error("DOM node {child} is not a child of {parent}")]
    NotAChild { parent: DomId, child: DomId },

    #[error("Node {0} has no DOM counterpart")]
    MissingDom(NodeKey),

    #[error(transparent)]
    Model(#[from] ModelError),
}
