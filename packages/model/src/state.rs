//! # Editor State
//!
//! An immutable snapshot of the document: the node store plus the
//! selection. A committed state is never modified again; transactions start
//! from a clone that shares every node until it is written.

use crate::error::{ModelError, ModelResult};
use crate::key::NodeKey;
use crate::node::{Node, NodeKind};
use crate::selection::Selection;
use crate::store::NodeStore;
use crate::traversal;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct EditorState {
    store: NodeStore,
    selection: Option<Selection>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::empty()
    }
}

impl EditorState {
    pub fn new(store: NodeStore, selection: Option<Selection>) -> Self {
        Self { store, selection }
    }

    /// A document holding only the root
    pub fn empty() -> Self {
        Self::new(NodeStore::new(), None)
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.store.get(key)
    }

    pub fn root(&self) -> Option<&Node> {
        self.store.root()
    }

    pub fn text_content(&self) -> String {
        traversal::text_content(&self.store, &NodeKey::root())
    }

    /// No content beyond, at most, one empty paragraph
    pub fn is_empty(&self) -> bool {
        let Some(root) = self.root() else {
            return true;
        };
        match root.children() {
            [] => true,
            [only] => self
                .store
                .get(only)
                .is_some_and(|n| n.is_block_element() && n.children().is_empty()),
            _ => false,
        }
    }

    pub fn with_selection(&self, selection: Option<Selection>) -> Self {
        Self::new(self.store.clone(), selection)
    }

    pub fn into_parts(self) -> (NodeStore, Option<Selection>) {
        (self.store, self.selection)
    }

    /// Structural integrity check.
    ///
    /// - a single root, with no parent
    /// - every listed child exists and points back at its parent
    /// - no node is reachable twice, no cycles
    /// - nothing is detached
    /// - the selection only references live nodes with in-range offsets
    pub fn validate(&self) -> ModelResult<()> {
        let root_key = NodeKey::root();
        let root = self
            .store
            .get(&root_key)
            .ok_or_else(|| ModelError::NodeNotFound(root_key.clone()))?;
        if !root.is_root() || root.parent.is_some() {
            return Err(ModelError::InvalidRoot(root.type_name().to_string()));
        }

        let mut visited: HashSet<NodeKey> = HashSet::with_capacity(self.store.len());
        visited.insert(root_key.clone());
        // (node, ancestors on the current path)
        let mut stack: Vec<(NodeKey, Vec<NodeKey>)> = vec![(root_key, Vec::new())];
        while let Some((key, path)) = stack.pop() {
            let node = self.store.require(&key)?;
            for child_key in node.children() {
                let child = self.store.require(child_key)?;
                if child.parent.as_ref() != Some(&key) {
                    return Err(ModelError::ParentMismatch {
                        child: child_key.clone(),
                        parent: key.clone(),
                    });
                }
                if matches!(child.kind, NodeKind::Root(_)) || path.contains(child_key) || child_key == &key {
                    return Err(ModelError::CycleDetected(child_key.clone()));
                }
                if !visited.insert(child_key.clone()) {
                    return Err(ModelError::DuplicateChild(child_key.clone()));
                }
                let mut child_path = path.clone();
                child_path.push(key.clone());
                stack.push((child_key.clone(), child_path));
            }
        }

        for (key, node) in self.store.iter() {
            if visited.contains(key) {
                continue;
            }
            return Err(match &node.parent {
                Some(parent) if self.store.contains(parent) => ModelError::ParentMismatch {
                    child: key.clone(),
                    parent: parent.clone(),
                },
                _ => ModelError::Detached(key.clone()),
            });
        }

        if let Some(selection) = &self.selection {
            selection.validate(&self.store)?;
        }
        Ok(())
    }
}
