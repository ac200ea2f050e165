//! # Node Store
//!
//! Maps keys to the latest version of each node. Nodes are held behind
//! `Arc` so that consecutive editor states share every node neither of them
//! touched: cloning a store copies pointers, and [`NodeStore::get_mut`] clones
//! a node only when another store still points at it.

use crate::error::{ModelError, ModelResult};
use crate::key::NodeKey;
use crate::node::Node;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: HashMap<NodeKey, Arc<Node>>,
}

impl NodeStore {
    /// Store holding a single empty root
    pub fn new() -> Self {
        let mut store = Self::empty();
        store.insert(Node::root());
        store
    }

    /// Store without any node (not a valid document on its own)
    pub fn empty() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key).map(Arc::as_ref)
    }

    pub fn get_arc(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        self.nodes.get(key)
    }

    /// Lookup that reports a missing key as an error
    pub fn require(&self, key: &NodeKey) -> ModelResult<&Node> {
        self.get(key)
            .ok_or_else(|| ModelError::NodeNotFound(key.clone()))
    }

    /// Mutable access, cloning the node first if it is shared
    pub fn get_mut(&mut self, key: &NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key).map(Arc::make_mut)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Insert or replace a node under its own key
    pub fn insert(&mut self, node: Node) -> Option<Arc<Node>> {
        self.nodes.insert(node.key.clone(), Arc::new(node))
    }

    pub fn insert_arc(&mut self, node: Arc<Node>) -> Option<Arc<Node>> {
        self.nodes.insert(node.key.clone(), node)
    }

    pub fn remove(&mut self, key: &NodeKey) -> Option<Arc<Node>> {
        self.nodes.remove(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &Node)> {
        self.nodes.iter().map(|(key, node)| (key, node.as_ref()))
    }

    pub fn root(&self) -> Option<&Node> {
        self.get(&NodeKey::root())
    }

    /// Whether both stores hold the very same allocation for `key`
    pub fn shares_node(&self, other: &NodeStore, key: &NodeKey) -> bool {
        match (self.nodes.get(key), other.nodes.get(key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_has_root() {
        let store = NodeStore::new();
        assert_eq!(store.len(), 1);
        assert!(store.root().is_some_and(|root| root.is_root()));
    }

    #[test]
    fn test_clone_shares_nodes_until_written() {
        let mut store = NodeStore::new();
        let key = NodeKey::from("t");
        store.insert(Node::text(key.clone(), "hello"));

        let snapshot = store.clone();
        assert!(store.shares_node(&snapshot, &key));

        if let Some(node) = store.get_mut(&key) {
            node.version += 1;
        }

        assert!(!store.shares_node(&snapshot, &key));
        assert_eq!(snapshot.get(&key).map(|n| n.version), Some(0));
        assert_eq!(store.get(&key).map(|n| n.version), Some(1));
        assert!(store.shares_node(&snapshot, &NodeKey::root()));
    }

    #[test]
    fn test_require_reports_missing_key() {
        let store = NodeStore::new();
        let missing = NodeKey::from("nope");
        assert_eq!(
            store.require(&missing).unwrap_err(),
            ModelError::NodeNotFound(missing)
        );
    }
}
