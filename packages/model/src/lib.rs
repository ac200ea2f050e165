//! # Verso Model
//!
//! The document model shared by the editor and the reconciler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ EditorState (immutable snapshot)            │
//! │  - NodeStore: key → Arc<Node>               │
//! │  - Selection: range | node | grid           │
//! └─────────────────────────────────────────────┘
//!            ↑ clone (shares every node)
//! ┌─────────────────────────────────────────────┐
//! │ pending store: written nodes are copied     │
//! │ once, untouched nodes stay shared           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Keys, not pointers**: parents, children and selection points all
//!    refer to nodes by [`NodeKey`]
//! 2. **Closed node set**: [`NodeKind`] is matched exhaustively
//! 3. **Snapshots are immutable**: a committed [`EditorState`] is never
//!    written again

pub mod error;
pub mod format;
pub mod grid;
pub mod key;
pub mod node;
pub mod selection;
pub mod serializer;
pub mod state;
pub mod store;
pub mod traversal;

pub use error::{ModelError, ModelResult};
pub use format::{Direction, ElementFormat, TextFormat, TextFormatType, TextMode};
pub use grid::{plan_grid_merge, GridCell, GridPlacement, GridRange, GridSelection, TableMap};
pub use key::{KeyGenerator, NodeKey};
pub use node::{DecoratorData, ElementData, ElementKind, Node, NodeKind, TextData};
pub use selection::{NodeSelection, Point, PointType, RangeSelection, Selection};
pub use serializer::{Schema, SerializedEditorState, SerializedNode};
pub use state::EditorState;
pub use store::NodeStore;
pub use traversal::Visitor;
