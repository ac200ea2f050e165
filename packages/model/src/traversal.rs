//! # Tree Traversal
//!
//! Document-order helpers over a [`NodeStore`]. Every relation (parent,
//! sibling, child) is resolved by key lookup; nothing here holds a reference
//! into the tree beyond the borrow of the store.

use crate::key::NodeKey;
use crate::node::{DecoratorData, ElementData, Node, NodeKind, TextData};
use crate::store::NodeStore;
use std::cmp::Ordering;

/// Separator between the text of two sibling blocks
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Visitor pattern for traversing a document immutably
///
/// Default implementations walk the whole subtree. Override specific
/// visit_* methods to act on nodes.
pub trait Visitor: Sized {
    fn visit_node(&mut self, store: &NodeStore, node: &Node) {
        walk_node(self, store, node);
    }

    fn visit_element(&mut self, store: &NodeStore, _node: &Node, data: &ElementData) {
        walk_element(self, store, data);
    }

    fn visit_text(&mut self, _node: &Node, _data: &TextData) {
        // Leaf node, no children to walk
    }

    fn visit_line_break(&mut self, _node: &Node) {
        // Leaf node, no children to walk
    }

    fn visit_decorator(&mut self, _node: &Node, _data: &DecoratorData) {
        // Leaf node, no children to walk
    }
}

pub fn walk_node<V: Visitor>(visitor: &mut V, store: &NodeStore, node: &Node) {
    match &node.kind {
        NodeKind::Root(data) | NodeKind::Element(_, data) => visitor.visit_element(store, node, data),
        NodeKind::Text(data) => visitor.visit_text(node, data),
        NodeKind::LineBreak => visitor.visit_line_break(node),
        NodeKind::Decorator(data) => visitor.visit_decorator(node, data),
    }
}

pub fn walk_element<V: Visitor>(visitor: &mut V, store: &NodeStore, data: &ElementData) {
    for key in &data.children {
        if let Some(child) = store.get(key) {
            visitor.visit_node(store, child);
        }
    }
}

/// Collects leaves in document order
#[derive(Debug, Default)]
pub struct LeafCollector {
    pub leaves: Vec<NodeKey>,
}

impl Visitor for LeafCollector {
    fn visit_text(&mut self, node: &Node, _data: &TextData) {
        self.leaves.push(node.key.clone());
    }

    fn visit_line_break(&mut self, node: &Node) {
        self.leaves.push(node.key.clone());
    }

    fn visit_decorator(&mut self, node: &Node, _data: &DecoratorData) {
        self.leaves.push(node.key.clone());
    }
}

pub fn parent<'a>(store: &'a NodeStore, key: &NodeKey) -> Option<&'a Node> {
    store.get(key)?.parent.as_ref().and_then(|p| store.get(p))
}

pub fn index_in_parent(store: &NodeStore, key: &NodeKey) -> Option<usize> {
    parent(store, key)?.children().iter().position(|k| k == key)
}

pub fn previous_sibling<'a>(store: &'a NodeStore, key: &NodeKey) -> Option<&'a NodeKey> {
    let siblings = parent(store, key)?.children();
    let index = siblings.iter().position(|k| k == key)?;
    index.checked_sub(1).and_then(|i| siblings.get(i))
}

pub fn next_sibling<'a>(store: &'a NodeStore, key: &NodeKey) -> Option<&'a NodeKey> {
    let siblings = parent(store, key)?.children();
    let index = siblings.iter().position(|k| k == key)?;
    siblings.get(index + 1)
}

/// Ancestors from nearest to furthest. Stops early on a broken or cyclic
/// parent chain.
pub fn ancestors(store: &NodeStore, key: &NodeKey) -> Vec<NodeKey> {
    let mut result = Vec::new();
    let mut current = store.get(key).and_then(|n| n.parent.clone());
    while let Some(k) = current {
        if result.len() > store.len() || result.contains(&k) {
            break;
        }
        current = store.get(&k).and_then(|n| n.parent.clone());
        result.push(k);
    }
    result
}

/// Whether the node is reachable from the root by following parent links
pub fn is_attached(store: &NodeStore, key: &NodeKey) -> bool {
    if key.is_root() {
        return store.contains(key);
    }
    let mut current = match store.get(key) {
        Some(node) => node.parent.clone(),
        None => return false,
    };
    let mut steps = 0;
    while let Some(k) = current {
        if k.is_root() {
            return true;
        }
        steps += 1;
        if steps > store.len() {
            return false;
        }
        current = store.get(&k).and_then(|n| n.parent.clone());
    }
    false
}

/// Strict ancestry test
pub fn is_ancestor_of(store: &NodeStore, ancestor: &NodeKey, key: &NodeKey) -> bool {
    ancestors(store, key).iter().any(|k| k == ancestor)
}

/// Ancestor-or-self that is a direct child of the root
pub fn top_level_element(store: &NodeStore, key: &NodeKey) -> Option<NodeKey> {
    if key.is_root() {
        return None;
    }
    let mut chain = vec![key.clone()];
    chain.extend(ancestors(store, key));
    let root_index = chain.iter().position(NodeKey::is_root)?;
    root_index.checked_sub(1).map(|i| chain[i].clone())
}

/// Nearest ancestor-or-self that is a block element or the root
pub fn nearest_block(store: &NodeStore, key: &NodeKey) -> Option<NodeKey> {
    let node = store.get(key)?;
    if node.is_root() || node.is_block_element() {
        return Some(key.clone());
    }
    ancestors(store, key).into_iter().find(|k| {
        store
            .get(k)
            .is_some_and(|n| n.is_root() || n.is_block_element())
    })
}

/// Descend through first children until reaching a leaf or an empty element
pub fn first_leaf(store: &NodeStore, key: &NodeKey) -> NodeKey {
    let mut current = key.clone();
    while let Some(first) = store.get(&current).and_then(|n| n.children().first()) {
        current = first.clone();
    }
    current
}

/// Descend through last children until reaching a leaf or an empty element
pub fn last_leaf(store: &NodeStore, key: &NodeKey) -> NodeKey {
    let mut current = key.clone();
    while let Some(last) = store.get(&current).and_then(|n| n.children().last()) {
        current = last.clone();
    }
    current
}

/// Descendants in document order (pre-order, excluding `key` itself)
pub fn descendants(store: &NodeStore, key: &NodeKey) -> Vec<NodeKey> {
    let mut result = Vec::new();
    let mut stack: Vec<NodeKey> = store
        .get(key)
        .map(|n| n.children().iter().rev().cloned().collect())
        .unwrap_or_default();
    while let Some(k) = stack.pop() {
        if let Some(node) = store.get(&k) {
            stack.extend(node.children().iter().rev().cloned());
        }
        result.push(k);
        if result.len() > store.len() {
            break;
        }
    }
    result
}

/// Child-index path from the root down to `key`
pub fn path_to(store: &NodeStore, key: &NodeKey) -> Option<Vec<usize>> {
    if key.is_root() {
        return Some(Vec::new());
    }
    let mut path = Vec::new();
    let mut current = key.clone();
    while !current.is_root() {
        path.push(index_in_parent(store, &current)?);
        current = store.get(&current)?.parent.clone()?;
        if path.len() > store.len() {
            return None;
        }
    }
    path.reverse();
    Some(path)
}

pub fn node_at_path<'a>(store: &'a NodeStore, path: &[usize]) -> Option<&'a Node> {
    let mut node = store.root()?;
    for index in path {
        let key = node.children().get(*index)?;
        node = store.get(key)?;
    }
    Some(node)
}

/// Document order of two attached nodes. Ancestors sort before descendants.
pub fn compare_document_order(store: &NodeStore, a: &NodeKey, b: &NodeKey) -> Option<Ordering> {
    Some(path_to(store, a)?.cmp(&path_to(store, b)?))
}

/// Lowest common ancestor-or-self of two nodes
pub fn common_ancestor(store: &NodeStore, a: &NodeKey, b: &NodeKey) -> Option<NodeKey> {
    let mut chain_a = vec![a.clone()];
    chain_a.extend(ancestors(store, a));
    let mut chain_b = vec![b.clone()];
    chain_b.extend(ancestors(store, b));
    chain_a.into_iter().find(|k| chain_b.contains(k))
}

/// First leaf after the subtree of `key`, in document order
pub fn next_leaf(store: &NodeStore, key: &NodeKey) -> Option<NodeKey> {
    let mut current = key.clone();
    loop {
        if let Some(sibling) = next_sibling(store, &current) {
            return Some(first_leaf(store, sibling));
        }
        current = store.get(&current)?.parent.clone()?;
        if current.is_root() {
            return None;
        }
    }
}

/// Last leaf before `key`, in document order
pub fn previous_leaf(store: &NodeStore, key: &NodeKey) -> Option<NodeKey> {
    let mut current = key.clone();
    loop {
        if let Some(sibling) = previous_sibling(store, &current) {
            return Some(last_leaf(store, sibling));
        }
        current = store.get(&current)?.parent.clone()?;
        if current.is_root() {
            return None;
        }
    }
}

/// Plain text of a subtree. Sibling blocks are separated by a blank line.
pub fn text_content(store: &NodeStore, key: &NodeKey) -> String {
    let mut output = String::new();
    if let Some(node) = store.get(key) {
        append_text_content(store, node, &mut output, 0);
    }
    output
}

fn append_text_content(store: &NodeStore, node: &Node, output: &mut String, depth: usize) {
    if depth > store.len() {
        return;
    }
    match &node.kind {
        NodeKind::Text(data) => output.push_str(&data.text),
        NodeKind::LineBreak => output.push('\n'),
        NodeKind::Decorator(_) => {}
        NodeKind::Root(data) | NodeKind::Element(_, data) => {
            let count = data.children.len();
            for (i, key) in data.children.iter().enumerate() {
                let Some(child) = store.get(key) else {
                    continue;
                };
                append_text_content(store, child, output, depth + 1);
                if child.is_block_element() && i + 1 < count {
                    output.push_str(BLOCK_SEPARATOR);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root ─ p1 ─ t1 "ab"
    ///      └ p2 ─ t2 "cd"
    ///            └ br
    fn sample() -> NodeStore {
        let mut store = NodeStore::new();
        let link = |store: &mut NodeStore, parent: &str, mut node: Node| {
            node.parent = Some(NodeKey::from(parent));
            let key = node.key.clone();
            store.insert(node);
            if let Some(p) = store.get_mut(&NodeKey::from(parent)) {
                if let Some(data) = p.element_mut() {
                    data.children.push(key);
                }
            }
        };
        link(&mut store, "root", Node::paragraph(NodeKey::from("p1")));
        link(&mut store, "p1", Node::text(NodeKey::from("t1"), "ab"));
        link(&mut store, "root", Node::paragraph(NodeKey::from("p2")));
        link(&mut store, "p2", Node::text(NodeKey::from("t2"), "cd"));
        link(&mut store, "p2", Node::line_break(NodeKey::from("br")));
        store
    }

    #[test]
    fn test_text_content_separates_blocks() {
        let store = sample();
        assert_eq!(text_content(&store, &NodeKey::root()), "ab\n\ncd\n");
    }

    #[test]
    fn test_document_order() {
        let store = sample();
        let t1 = NodeKey::from("t1");
        let t2 = NodeKey::from("t2");
        let p1 = NodeKey::from("p1");

        assert_eq!(compare_document_order(&store, &t1, &t2), Some(Ordering::Less));
        assert_eq!(compare_document_order(&store, &p1, &t1), Some(Ordering::Less));
        assert_eq!(path_to(&store, &t2), Some(vec![1, 0]));
        assert_eq!(node_at_path(&store, &[1, 1]).map(|n| n.key.clone()), Some(NodeKey::from("br")));
    }

    #[test]
    fn test_leaf_navigation() {
        let store = sample();
        assert_eq!(next_leaf(&store, &NodeKey::from("t1")), Some(NodeKey::from("t2")));
        assert_eq!(previous_leaf(&store, &NodeKey::from("t2")), Some(NodeKey::from("t1")));
        assert_eq!(previous_leaf(&store, &NodeKey::from("t1")), None);
        assert_eq!(last_leaf(&store, &NodeKey::root()), NodeKey::from("br"));
    }

    #[test]
    fn test_ancestry() {
        let store = sample();
        let t2 = NodeKey::from("t2");
        assert_eq!(ancestors(&store, &t2), vec![NodeKey::from("p2"), NodeKey::root()]);
        assert_eq!(top_level_element(&store, &t2), Some(NodeKey::from("p2")));
        assert_eq!(nearest_block(&store, &t2), Some(NodeKey::from("p2")));
        assert_eq!(
            common_ancestor(&store, &NodeKey::from("t1"), &t2),
            Some(NodeKey::root())
        );
        assert!(is_attached(&store, &t2));
    }

    #[test]
    fn test_leaf_collector() {
        let store = sample();
        let mut collector = LeafCollector::default();
        if let Some(root) = store.root() {
            collector.visit_node(&store, root);
        }
        assert_eq!(
            collector.leaves,
            vec![NodeKey::from("t1"), NodeKey::from("t2"), NodeKey::from("br")]
        );
    }
}
