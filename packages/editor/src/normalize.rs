//! # Normalization
//!
//! Commit-time cleanup of the pending document:
//!
//! - adjacent simple text nodes with identical format and style merge
//! - empty simple text nodes are removed unless the selection is in them
//! - nodes detached during the transaction are dropped from the store
//! - the region touched by the transaction is checked for consistency

use crate::errors::{EditorError, EditorResult};
use crate::transaction::{PendingState, Transaction};
use std::collections::HashSet;
use tracing::debug;
use verso_model::traversal;
use verso_model::{ModelError, NodeKey};

impl Transaction<'_> {
    pub(crate) fn normalize_text_node(&mut self, key: &NodeKey) -> EditorResult<()> {
        let Some(data) = self.get(key).and_then(|node| node.text_data()) else {
            return Ok(());
        };
        if !data.is_simple() || !self.is_attached(key) {
            return Ok(());
        }
        if data.is_empty() {
            if !self.is_selected(key) {
                self.remove(key)?;
            }
            return Ok(());
        }

        if let Some(previous) = traversal::previous_sibling(self.store(), key).cloned() {
            if self.mergeable(key, &previous) {
                self.merge_with_sibling(key, &previous)?;
            }
        }
        if let Some(next) = traversal::next_sibling(self.store(), key).cloned() {
            if self.mergeable(key, &next) {
                self.merge_with_sibling(key, &next)?;
            }
        }
        Ok(())
    }

    fn mergeable(&self, key: &NodeKey, other: &NodeKey) -> bool {
        match (
            self.get(key).and_then(|n| n.text_data()),
            self.get(other).and_then(|n| n.text_data()),
        ) {
            (Some(a), Some(b)) => a.can_merge_with(b),
            _ => false,
        }
    }
}

/// Drop every node that ended the transaction detached from the root.
/// Returns the removed keys.
pub(crate) fn collect_garbage(pending: &mut PendingState) -> Vec<NodeKey> {
    let candidates: Vec<NodeKey> = pending
        .dirty_leaves
        .iter()
        .chain(pending.dirty_elements.keys())
        .cloned()
        .collect();

    let mut removed = Vec::new();
    for key in candidates {
        if !pending.store.contains(&key) || traversal::is_attached(&pending.store, &key) {
            continue;
        }
        let mut subtree = vec![key.clone()];
        subtree.extend(traversal::descendants(&pending.store, &key));
        for node in subtree {
            if pending.store.remove(&node).is_some() {
                removed.push(node);
            }
        }
    }
    if !removed.is_empty() {
        debug!(count = removed.len(), "collected detached nodes");
    }
    removed
}

/// Consistency of the nodes touched by the transaction and of the selection
pub(crate) fn validate_dirty(pending: &PendingState) -> EditorResult<()> {
    let store = &pending.store;
    for key in pending.dirty_elements.keys() {
        let Some(node) = store.get(key) else {
            continue;
        };
        let mut seen = HashSet::new();
        for child_key in node.children() {
            let child = store.require(child_key)?;
            if child.parent.as_ref() != Some(key) {
                return Err(ModelError::ParentMismatch {
                    child: child_key.clone(),
                    parent: key.clone(),
                }
                .into());
            }
            if !seen.insert(child_key) {
                return Err(ModelError::DuplicateChild(child_key.clone()).into());
            }
            if node.is_root() && child.is_inline() {
                return Err(EditorError::structure(format!("inline node {child_key} at the root")));
            }
        }
    }

    for key in pending.dirty_leaves.iter().chain(pending.dirty_elements.keys()) {
        let Some(node) = store.get(key) else {
            continue;
        };
        if let Some(parent) = &node.parent {
            let listed = store.get(parent).is_some_and(|p| p.children().contains(key));
            if !listed {
                return Err(ModelError::ParentMismatch {
                    child: key.clone(),
                    parent: parent.clone(),
                }
                .into());
            }
        } else if !node.is_root() {
            return Err(ModelError::Detached(key.clone()).into());
        }
    }

    if let Some(selection) = &pending.selection {
        selection.validate(store)?;
    }
    Ok(())
}
