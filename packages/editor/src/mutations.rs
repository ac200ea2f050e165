//! # Structural Mutations
//!
//! Insert, move, remove and replace nodes. Every operation keeps parent
//! links and child lists in agreement, marks the touched nodes dirty and
//! keeps the selection on live nodes.
//!
//! ## Validation
//!
//! - the root can never be inserted, removed or replaced
//! - a node can never become its own ancestor
//! - only block nodes may be children of the root
//! - a node that is already attached is moved, never duplicated

use crate::errors::{EditorError, EditorResult};
use crate::transaction::Transaction;
use verso_model::traversal;
use verso_model::{NodeKey, Point};

impl Transaction<'_> {
    /// Append `children` to `parent` in order
    pub fn append(&mut self, parent: &NodeKey, children: &[NodeKey]) -> EditorResult<()> {
        for child in children {
            let len = self.node(parent)?.children().len();
            self.insert_child(parent, len, child)?;
        }
        Ok(())
    }

    pub fn insert_after(&mut self, sibling: &NodeKey, node: &NodeKey) -> EditorResult<()> {
        let parent = self.parent_key(sibling)?;
        self.detach_for_move(node, sibling)?;
        let index = self.index_of(sibling)?;
        self.insert_child(&parent, index + 1, node)
    }

    pub fn insert_before(&mut self, sibling: &NodeKey, node: &NodeKey) -> EditorResult<()> {
        let parent = self.parent_key(sibling)?;
        self.detach_for_move(node, sibling)?;
        let index = self.index_of(sibling)?;
        self.insert_child(&parent, index, node)
    }

    /// Remove `delete_count` children starting at `start`, then insert
    /// `nodes` there. Returns the removed keys.
    pub fn splice(
        &mut self,
        parent: &NodeKey,
        start: usize,
        delete_count: usize,
        nodes: &[NodeKey],
    ) -> EditorResult<Vec<NodeKey>> {
        let children = self.children(parent)?;
        let start = start.min(children.len());
        let end = start.saturating_add(delete_count).min(children.len());
        let removed = children[start..end].to_vec();
        for key in &removed {
            self.detach(key, true)?;
        }
        for (offset, node) in nodes.iter().enumerate() {
            self.insert_child(parent, start + offset, node)?;
        }
        Ok(removed)
    }

    /// Remove a node and its subtree. Parents left empty that cannot be
    /// empty are removed too.
    pub fn remove(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.detach(key, false)
    }

    /// Remove a node, leaving its parent in place even when empty
    pub fn remove_preserving_parent(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.detach(key, true)
    }

    /// Put `with` where `key` is. With `include_children`, `key`'s children
    /// move over to `with`.
    pub fn replace(&mut self, key: &NodeKey, with: &NodeKey, include_children: bool) -> EditorResult<()> {
        if key.is_root() || with.is_root() {
            return Err(EditorError::RootRemoval);
        }
        if key == with {
            return Ok(());
        }
        self.parent_key(key)?;
        // Points are remapped from where they were before children moved
        let original = self
            .range_selection()
            .map(|range| [range.anchor.clone(), range.focus.clone()]);
        if include_children {
            let children = self.children(key)?;
            self.append(with, &children)?;
        }
        self.insert_after(key, with)?;

        if let Some(original) = original {
            let replacement = self.node(with)?;
            let with_is_element = replacement.is_element();
            let with_text_len = replacement.text_data().map(|data| data.len());
            let remapped: Vec<Option<Point>> = original
                .iter()
                .map(|point| {
                    if &point.key != key {
                        None
                    } else if point.is_text() {
                        with_text_len.map(|len| Point::text(with.clone(), point.offset.min(len)))
                    } else if include_children && with_is_element {
                        Some(Point::element(with.clone(), point.offset))
                    } else {
                        None
                    }
                })
                .collect();
            let mut index = 0;
            self.update_points(|point| {
                if let Some(Some(target)) = remapped.get(index) {
                    *point = target.clone();
                }
                index += 1;
            });
        }
        self.detach(key, true)
    }

    /// Remove every child of an element
    pub fn clear_children(&mut self, element: &NodeKey) -> EditorResult<()> {
        for child in self.children(element)? {
            self.detach(&child, true)?;
        }
        Ok(())
    }

    /// Move every child of `from` to the end of `to`
    pub fn move_children(&mut self, from: &NodeKey, to: &NodeKey) -> EditorResult<()> {
        let children = self.children(from)?;
        self.append(to, &children)
    }

    /// Detach `node` ahead of placing it next to `sibling`
    fn detach_for_move(&mut self, node: &NodeKey, sibling: &NodeKey) -> EditorResult<()> {
        if node == sibling {
            return Err(EditorError::CycleDetected(node.clone()));
        }
        if self.node(node)?.parent.is_some() {
            self.detach_to_move(node)?;
        }
        Ok(())
    }

    pub(crate) fn insert_child(&mut self, parent: &NodeKey, index: usize, child: &NodeKey) -> EditorResult<()> {
        let child_node = self.node(child)?;
        if child_node.is_root() {
            return Err(EditorError::structure("the root cannot be inserted"));
        }
        let child_is_inline = child_node.is_inline();
        let parent_node = self.node(parent)?;
        if !parent_node.is_element() {
            return Err(EditorError::NotAnElement(parent.clone()));
        }
        if parent_node.is_root() && child_is_inline {
            return Err(EditorError::structure(format!(
                "{child} is inline and cannot be a child of the root"
            )));
        }
        if child == parent || traversal::is_ancestor_of(self.store(), child, parent) {
            return Err(EditorError::CycleDetected(child.clone()));
        }

        let mut index = index;
        if let Some(old_parent) = self.node(child)?.parent.clone() {
            let old_index = self.index_of(child)?;
            self.detach_to_move(child)?;
            if &old_parent == parent && old_index < index {
                index -= 1;
            }
        }

        let index = index.min(self.node(parent)?.children().len());
        self.writable_element(parent)?.children.insert(index, child.clone());
        self.writable(child)?.parent = Some(parent.clone());
        self.update_points(|point| {
            if !point.is_text() && &point.key == parent && point.offset >= index {
                point.offset += 1;
            }
        });
        Ok(())
    }

    pub(crate) fn detach(&mut self, key: &NodeKey, preserve_empty_parent: bool) -> EditorResult<()> {
        self.unlink(key, preserve_empty_parent, false)
    }

    /// Take a node out of its parent ahead of inserting it elsewhere
    fn detach_to_move(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.unlink(key, true, true)
    }

    fn unlink(&mut self, key: &NodeKey, preserve_empty_parent: bool, moving: bool) -> EditorResult<()> {
        if key.is_root() {
            return Err(EditorError::RootRemoval);
        }
        let Some(parent) = self.node(key)?.parent.clone() else {
            return Ok(());
        };
        let index = self.index_of(key)?;
        self.repoint_removed(key, &parent, index, moving);
        self.writable_element(&parent)?.children.remove(index);
        self.writable(key)?.parent = None;

        if !preserve_empty_parent && !parent.is_root() {
            let parent_node = self.node(&parent)?;
            if parent_node.children().is_empty() && !parent_node.can_be_empty() {
                self.detach(&parent, false)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::EditorError;
    use crate::transaction::tests::Fixture;
    use verso_model::{ElementKind, NodeKey, Point, Selection};

    #[test]
    fn test_append_and_move() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let root = NodeKey::root();
        let a = tx.create_paragraph();
        let b = tx.create_paragraph();
        tx.append(&root, &[a.clone(), b.clone()]).unwrap();
        tx.insert_before(&a, &b).unwrap();
        assert_eq!(tx.children(&root).unwrap(), vec![b.clone(), a.clone()]);
        tx.append(&root, &[b.clone()]).unwrap();
        assert_eq!(tx.children(&root).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_inline_nodes_rejected_at_root() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let text = tx.create_text("x");
        let result = tx.append(&NodeKey::root(), &[text]);
        assert!(matches!(result, Err(EditorError::InvalidStructure(_))));
    }

    #[test]
    fn test_cycles_rejected() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let outer = tx.create_element(ElementKind::Quote);
        let inner = tx.create_paragraph();
        tx.append(&NodeKey::root(), &[outer.clone()]).unwrap();
        tx.append(&outer, &[inner.clone()]).unwrap();
        assert_eq!(tx.append(&inner, &[outer.clone()]), Err(EditorError::CycleDetected(outer.clone())));
        assert_eq!(tx.append(&outer, &[outer.clone()]), Err(EditorError::CycleDetected(outer)));
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        assert_eq!(tx.remove(&NodeKey::root()), Err(EditorError::RootRemoval));
    }

    #[test]
    fn test_remove_drops_empty_link() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let paragraph = tx.create_paragraph();
        let link = tx.create_element(ElementKind::Link { url: "/".to_string() });
        let text = tx.create_text("go");
        tx.append(&NodeKey::root(), &[paragraph.clone()]).unwrap();
        tx.append(&paragraph, &[link.clone()]).unwrap();
        tx.append(&link, &[text.clone()]).unwrap();

        tx.remove(&text).unwrap();
        assert!(tx.children(&paragraph).unwrap().is_empty());
        assert!(!tx.is_attached(&link));
    }

    #[test]
    fn test_remove_moves_selection_to_previous_text() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let paragraph = tx.create_paragraph();
        let first = tx.create_text("abc");
        let second = tx.create_line_break();
        tx.append(&NodeKey::root(), &[paragraph.clone()]).unwrap();
        tx.append(&paragraph, &[first.clone(), second.clone()]).unwrap();
        tx.select_caret(Point::element(paragraph.clone(), 2));

        tx.remove(&second).unwrap();
        let range = tx.range_selection().unwrap();
        assert_eq!(range.anchor, Point::element(paragraph, 1));

        tx.remove(&first).unwrap();
        assert!(matches!(tx.selection(), Some(Selection::Range(_))));
    }

    #[test]
    fn test_replace_with_children() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let paragraph = tx.create_paragraph();
        let text = tx.create_text("title");
        tx.append(&NodeKey::root(), &[paragraph.clone()]).unwrap();
        tx.append(&paragraph, &[text.clone()]).unwrap();
        tx.select_caret(Point::element(paragraph.clone(), 1));

        let heading = tx.create_element(ElementKind::Heading { level: 1 });
        tx.replace(&paragraph, &heading, true).unwrap();
        assert_eq!(tx.children(&NodeKey::root()).unwrap(), vec![heading.clone()]);
        assert_eq!(tx.children(&heading).unwrap(), vec![text]);
        assert_eq!(tx.range_selection().unwrap().anchor, Point::element(heading, 1));
        assert!(!tx.is_attached(&paragraph));
    }

    #[test]
    fn test_replace_keeps_caret_in_moved_text() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let paragraph = tx.create_paragraph();
        let text = tx.create_text("title");
        tx.append(&NodeKey::root(), &[paragraph.clone()]).unwrap();
        tx.append(&paragraph, &[text.clone()]).unwrap();
        tx.select_caret(Point::text(text.clone(), 3));

        let quote = tx.create_element(ElementKind::Quote);
        tx.replace(&paragraph, &quote, true).unwrap();
        let range = tx.range_selection().unwrap();
        assert_eq!(range.anchor, Point::text(text.clone(), 3));
        assert_eq!(range.focus, Point::text(text, 3));
    }

    #[test]
    fn test_moving_a_node_keeps_points_inside_it() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let first = tx.create_paragraph();
        let second = tx.create_paragraph();
        let text = tx.create_text("moved");
        tx.append(&NodeKey::root(), &[first.clone(), second.clone()]).unwrap();
        tx.append(&first, &[text.clone()]).unwrap();
        tx.select(Point::text(text.clone(), 1), Point::text(text.clone(), 4));

        tx.append(&second, &[text.clone()]).unwrap();
        assert_eq!(tx.children(&second).unwrap(), vec![text.clone()]);
        let range = tx.range_selection().unwrap();
        assert_eq!(range.anchor, Point::text(text.clone(), 1));
        assert_eq!(range.focus, Point::text(text.clone(), 4));

        // A real removal still moves the selection off the node
        tx.remove(&text).unwrap();
        assert_ne!(tx.range_selection().unwrap().anchor.key, text);
    }

    #[test]
    fn test_splice_returns_removed() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let paragraph = tx.create_paragraph();
        tx.append(&NodeKey::root(), &[paragraph.clone()]).unwrap();
        let a = tx.create_text("a");
        let b = tx.create_line_break();
        tx.append(&paragraph, &[a.clone(), b.clone()]).unwrap();
        let c = tx.create_text("c");
        let removed = tx.splice(&paragraph, 0, 1, &[c.clone()]).unwrap();
        assert_eq!(removed, vec![a]);
        assert_eq!(tx.children(&paragraph).unwrap(), vec![c, b]);
    }
}
