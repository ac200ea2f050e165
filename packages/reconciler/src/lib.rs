//! # Verso Reconciler
//!
//! Keeps a host DOM in sync with editor states.
//!
//! ```text
//! prev EditorState ─┐
//!                   ├─ Reconciler ─→ Vec<DomPatch> ─→ HostDom
//! next EditorState ─┘      ↑
//!        dirty leaves + dirty elements
//! ```
//!
//! The reconciler owns the key → DOM id mapping; hosts only ever see DOM ids.

pub mod dom;
pub mod error;
pub mod reconciler;
pub mod render;
pub mod vdom;

pub use dom::{DomId, DomPatch, DomPoint, HostDom, MemoryDom};
pub use error::{ReconcileError, ReconcileResult};
pub use reconciler::{DirtySets, ReconcileOutcome, Reconciler};
pub use render::{export_dom, export_html, host_shape, HostShape, Theme};
pub use vdom::HostNode;
