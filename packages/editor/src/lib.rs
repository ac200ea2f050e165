//! # Verso Editor
//!
//! Transaction engine and editing operations for Verso documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: nodes, keys, selection, EditorState  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: transactions + commit pipeline      │
//! │  - Copy-on-write pending state              │
//! │  - Node, text and selection operations      │
//! │  - Transforms and normalization to fixpoint │
//! │  - Commands, listeners, history             │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ reconciler: state diff → host DOM patches   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Committed states are immutable**: a commit produces a new
//!    [`EditorState`] sharing every untouched node with the previous one
//! 2. **One way to change the document**: every edit runs inside
//!    [`Editor::update`] on a [`Transaction`]
//! 3. **Errors never leak half-done work**: a failing update leaves the
//!    last committed state in place
//! 4. **The DOM is derived**: the reconciler only ever applies the
//!    difference between two committed states
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verso_editor::{register_history, register_rich_text, Editor, INSERT_TEXT};
//!
//! let mut editor = Editor::default();
//! let _rich_text = register_rich_text(&editor);
//! let (history, _) = register_history(&editor, &editor.config().history.clone());
//!
//! editor.update(|tx| tx.clear())?;
//! editor.dispatch_command(INSERT_TEXT, "Hello".to_string())?;
//! assert_eq!(editor.read(|state| state.text_content())?, "Hello");
//! assert!(history.can_undo());
//! ```

mod commands;
mod config;
mod dom_import;
mod editor;
mod errors;
mod history;
mod listeners;
mod mutations;
mod normalize;
mod pipeline;
mod rich_text;
mod selection_ops;
mod text;
mod transaction;
mod transforms;

pub use commands::*;
pub use config::{EditorConfig, HistoryConfig, MIN_TRANSFORM_PASSES};
pub use dom_import::{AfterFn, ConvertFn, DomConversionOutput, ForChildFn};
pub use editor::{Editor, UpdateOptions};
pub use errors::{EditorError, EditorResult};
pub use history::{
    classify_change, register_history, ChangeKind, HistoryHandle, HistoryState, HISTORIC_TAG, HISTORY_MERGE_TAG,
    HISTORY_PUSH_TAG,
};
pub use listeners::{NodeMutation, UpdatePayload, Unregister};
pub use rich_text::register_rich_text;
pub use selection_ops::{end_point, start_point, DeleteUnit};
pub use transaction::Transaction;
pub use transforms::NodeTransform;

// Re-export the model and rendering types used throughout the API
pub use verso_model::{
    EditorState, ElementFormat, ElementKind, NodeKey, NodeKind, Point, RangeSelection, Selection, TextFormat,
    TextFormatType,
};
pub use verso_reconciler::{DomId, DomPatch, HostDom, HostNode, MemoryDom, Theme};
