//! # Transactions
//!
//! Every change to the document goes through a [`Transaction`]. It works on
//! a pending copy of the committed state: the node store is cloned (every
//! node shared), and a node is copied the first time it is written.
//!
//! ```text
//! committed store ──clone──→ pending store
//!   key → Arc<Node>            key → Arc<Node>   (shared)
//!                              writable(k): Arc::make_mut, version + 1
//!                                           mark k dirty, parents subtree-dirty
//! ```
//!
//! Structural operations live in `mutations`, text operations in `text`,
//! selection-driven editing in `selection_ops`. They are all methods on
//! [`Transaction`].

use crate::commands::Command;
use crate::errors::{EditorError, EditorResult};
use crate::listeners::Registry;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::trace;
use verso_model::traversal;
use verso_model::{
    DecoratorData, ElementData, ElementKind, EditorState, KeyGenerator, Node, NodeKey, NodeKind, NodeStore, Point,
    RangeSelection, Selection, TextData,
};

/// Working copy of the document between two commits
#[derive(Debug, Clone)]
pub(crate) struct PendingState {
    pub(crate) store: NodeStore,
    pub(crate) selection: Option<Selection>,
    /// Keys already copied, and version-bumped, in this transaction
    pub(crate) cloned: HashSet<NodeKey>,
    pub(crate) dirty_leaves: HashSet<NodeKey>,
    /// `true`: the element itself changed. `false`: only something below it.
    pub(crate) dirty_elements: HashMap<NodeKey, bool>,
    /// Nodes dirtied since the last transform pass
    pub(crate) transform_queue: HashSet<NodeKey>,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) skip_transforms: bool,
    /// A whole state was swapped in
    pub(crate) full_reconcile: bool,
}

impl PendingState {
    pub(crate) fn from_state(state: &EditorState) -> Self {
        Self {
            store: state.store().clone(),
            selection: state.selection().cloned(),
            cloned: HashSet::new(),
            dirty_leaves: HashSet::new(),
            dirty_elements: HashMap::new(),
            transform_queue: HashSet::new(),
            tags: BTreeSet::new(),
            skip_transforms: false,
            full_reconcile: false,
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        !self.dirty_leaves.is_empty() || !self.dirty_elements.is_empty() || self.full_reconcile
    }

    /// Whether committing would produce a state different from `committed`
    pub(crate) fn has_changes(&self, committed: &EditorState) -> bool {
        self.is_dirty() || self.selection.as_ref() != committed.selection()
    }
}

pub struct Transaction<'a> {
    pending: &'a mut PendingState,
    keys: &'a mut KeyGenerator,
    registry: &'a RefCell<Registry>,
    committed: &'a EditorState,
    editable: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        pending: &'a mut PendingState,
        keys: &'a mut KeyGenerator,
        registry: &'a RefCell<Registry>,
        committed: &'a EditorState,
        editable: bool,
    ) -> Self {
        Self {
            pending,
            keys,
            registry,
            committed,
            editable,
        }
    }

    pub(crate) fn registry(&self) -> &RefCell<Registry> {
        self.registry
    }

    pub(crate) fn take_transform_queue(&mut self) -> HashSet<NodeKey> {
        std::mem::take(&mut self.pending.transform_queue)
    }

    // -----------------------------------------------------------------------
    // Reading

    /// Latest version of every node, pending writes included
    pub fn store(&self) -> &NodeStore {
        &self.pending.store
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.pending.store.get(key)
    }

    pub fn node(&self, key: &NodeKey) -> EditorResult<&Node> {
        self.pending
            .store
            .get(key)
            .ok_or_else(|| EditorError::NodeNotFound(key.clone()))
    }

    pub fn root(&self) -> EditorResult<&Node> {
        self.node(&NodeKey::root())
    }

    /// The state this transaction started from
    pub fn committed_state(&self) -> &EditorState {
        self.committed
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn is_attached(&self, key: &NodeKey) -> bool {
        traversal::is_attached(&self.pending.store, key)
    }

    pub fn text_content(&self) -> String {
        traversal::text_content(&self.pending.store, &NodeKey::root())
    }

    pub fn parent_key(&self, key: &NodeKey) -> EditorResult<NodeKey> {
        self.node(key)?
            .parent
            .clone()
            .ok_or_else(|| EditorError::NoParent(key.clone()))
    }

    pub fn index_of(&self, key: &NodeKey) -> EditorResult<usize> {
        traversal::index_in_parent(&self.pending.store, key).ok_or_else(|| EditorError::NoParent(key.clone()))
    }

    pub fn children(&self, key: &NodeKey) -> EditorResult<Vec<NodeKey>> {
        let node = self.node(key)?;
        if !node.is_element() {
            return Err(EditorError::NotAnElement(key.clone()));
        }
        Ok(node.children().to_vec())
    }

    pub fn text(&self, key: &NodeKey) -> EditorResult<&TextData> {
        self.node(key)?
            .text_data()
            .ok_or_else(|| EditorError::NotText(key.clone()))
    }

    // -----------------------------------------------------------------------
    // Writing

    /// Mutable access to a node. The first write in a transaction copies the
    /// node and bumps its version; every write marks it dirty.
    pub fn writable(&mut self, key: &NodeKey) -> EditorResult<&mut Node> {
        let is_element = self.node(key)?.is_element();
        if self.pending.cloned.insert(key.clone()) {
            let committed = self.committed.node(key).map(|n| n.version).unwrap_or(0);
            if let Some(node) = self.pending.store.get_mut(key) {
                node.version = node.version.max(committed) + 1;
            }
        }
        self.record_dirty(key, is_element);
        self.pending
            .store
            .get_mut(key)
            .ok_or_else(|| EditorError::NodeNotFound(key.clone()))
    }

    pub(crate) fn writable_element(&mut self, key: &NodeKey) -> EditorResult<&mut ElementData> {
        self.writable(key)?
            .element_mut()
            .ok_or_else(|| EditorError::NotAnElement(key.clone()))
    }

    pub(crate) fn writable_text(&mut self, key: &NodeKey) -> EditorResult<&mut TextData> {
        if !self.node(key)?.is_text() {
            return Err(EditorError::NotText(key.clone()));
        }
        self.writable(key)?
            .text_data_mut()
            .ok_or_else(|| EditorError::NotText(key.clone()))
    }

    /// Force a node through transforms and reconciliation
    pub fn mark_dirty(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.writable(key).map(|_| ())
    }

    fn record_dirty(&mut self, key: &NodeKey, is_element: bool) {
        if is_element {
            self.pending.dirty_elements.insert(key.clone(), true);
        } else {
            self.pending.dirty_leaves.insert(key.clone());
        }
        self.pending.transform_queue.insert(key.clone());

        let mut current = self.pending.store.get(key).and_then(|n| n.parent.clone());
        while let Some(parent) = current {
            // Already marked: so are its ancestors
            if self.pending.dirty_elements.contains_key(&parent) {
                break;
            }
            self.pending.dirty_elements.insert(parent.clone(), false);
            current = self.pending.store.get(&parent).and_then(|n| n.parent.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Factories. New nodes start detached.

    fn insert_fresh(&mut self, kind: NodeKind) -> NodeKey {
        let key = self.keys.next_key();
        let is_element = matches!(kind, NodeKind::Element(..));
        let mut node = Node::new(key.clone(), kind);
        node.version = 1;
        self.pending.store.insert(node);
        self.pending.cloned.insert(key.clone());
        self.record_dirty(&key, is_element);
        key
    }

    pub fn create_node(&mut self, kind: NodeKind) -> EditorResult<NodeKey> {
        if matches!(kind, NodeKind::Root(_)) {
            return Err(EditorError::structure("a document has exactly one root"));
        }
        Ok(self.insert_fresh(kind))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeKey {
        self.insert_fresh(NodeKind::Text(TextData::new(text)))
    }

    pub fn create_text_with(&mut self, data: TextData) -> NodeKey {
        self.insert_fresh(NodeKind::Text(data))
    }

    pub fn create_element(&mut self, kind: ElementKind) -> NodeKey {
        self.insert_fresh(NodeKind::Element(kind, ElementData::default()))
    }

    pub fn create_paragraph(&mut self) -> NodeKey {
        self.create_element(ElementKind::Paragraph)
    }

    pub fn create_line_break(&mut self) -> NodeKey {
        self.insert_fresh(NodeKind::LineBreak)
    }

    pub fn create_decorator(
        &mut self,
        decorator_type: impl Into<String>,
        payload: serde_json::Value,
        inline: bool,
    ) -> NodeKey {
        self.insert_fresh(NodeKind::Decorator(DecoratorData {
            decorator_type: decorator_type.into(),
            payload,
            inline,
        }))
    }

    /// Detached copy of a node under a new key. Elements are copied
    /// without their children.
    pub fn copy_node(&mut self, key: &NodeKey) -> EditorResult<NodeKey> {
        let kind = match &self.node(key)?.kind {
            NodeKind::Root(_) => return Err(EditorError::RootRemoval),
            NodeKind::Element(kind, data) => NodeKind::Element(
                kind.clone(),
                ElementData {
                    children: Vec::new(),
                    ..data.clone()
                },
            ),
            other => other.clone(),
        };
        Ok(self.insert_fresh(kind))
    }

    // -----------------------------------------------------------------------
    // Selection

    pub fn selection(&self) -> Option<&Selection> {
        self.pending.selection.as_ref()
    }

    pub fn range_selection(&self) -> Option<&RangeSelection> {
        self.pending.selection.as_ref().and_then(Selection::as_range)
    }

    pub(crate) fn range(&self) -> EditorResult<RangeSelection> {
        self.range_selection().cloned().ok_or(EditorError::NoRangeSelection)
    }

    pub(crate) fn range_mut(&mut self) -> Option<&mut RangeSelection> {
        self.pending.selection.as_mut().and_then(Selection::as_range_mut)
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.pending.selection = selection;
    }

    /// Select a range. Format and style are picked up from the anchor's
    /// text node.
    pub fn select(&mut self, anchor: Point, focus: Point) {
        let mut range = RangeSelection::new(anchor, focus);
        if let Some(data) = self.get(&range.anchor.key).and_then(Node::text_data) {
            range.format = data.format;
            range.style = data.style.clone();
        }
        self.pending.selection = Some(Selection::Range(range));
    }

    pub fn select_caret(&mut self, point: Point) {
        self.select(point.clone(), point);
    }

    /// Collapse the range onto `point`, keeping its format
    pub(crate) fn move_caret(&mut self, point: Point) {
        match self.pending.selection.as_mut() {
            Some(Selection::Range(range)) => {
                range.anchor = point.clone();
                range.focus = point;
            }
            _ => self.select_caret(point),
        }
    }

    /// Apply `f` to both points of a range selection
    pub(crate) fn update_points(&mut self, mut f: impl FnMut(&mut Point)) {
        if let Some(Selection::Range(range)) = self.pending.selection.as_mut() {
            f(&mut range.anchor);
            f(&mut range.focus);
        }
    }

    pub(crate) fn is_selected(&self, key: &NodeKey) -> bool {
        match &self.pending.selection {
            Some(Selection::Range(range)) => &range.anchor.key == key || &range.focus.key == key,
            Some(Selection::Node(nodes)) => nodes.has(key),
            Some(Selection::Grid(grid)) => {
                &grid.anchor_cell_key == key || &grid.focus_cell_key == key || &grid.grid_key == key
            }
            None => false,
        }
    }

    /// Points moved off a node about to leave `parent` at `index`. A node
    /// that is only moving keeps the points inside its subtree.
    pub(crate) fn repoint_removed(&mut self, key: &NodeKey, parent: &NodeKey, index: usize, moving: bool) {
        let store = &self.pending.store;
        match self.pending.selection.as_mut() {
            Some(Selection::Range(range)) => {
                let fallback = removal_fallback(store, parent, index);
                for point in [&mut range.anchor, &mut range.focus] {
                    let inside = &point.key == key || traversal::is_ancestor_of(store, key, &point.key);
                    if inside {
                        if !moving {
                            *point = fallback.clone();
                        }
                    } else if !point.is_text() && &point.key == parent && point.offset > index {
                        point.offset -= 1;
                    }
                }
            }
            Some(Selection::Node(nodes)) if !moving => {
                nodes.keys.remove(key);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Transaction-wide

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.pending.tags.insert(tag.into());
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.pending.tags.contains(tag)
    }

    /// Run `mutator` as part of this transaction
    pub fn update<F>(&mut self, mutator: F) -> EditorResult<()>
    where
        F: FnOnce(&mut Transaction<'_>) -> EditorResult<()>,
    {
        mutator(self)
    }

    /// Dispatch a command to its handlers, highest priority first. Returns
    /// whether a handler claimed it.
    pub fn dispatch_command<P: 'static>(&mut self, command: Command<P>, payload: P) -> EditorResult<bool> {
        let handlers = self.registry.borrow().command_handlers(command.name());
        trace!(command = command.name(), handlers = handlers.len(), "dispatch");
        for handler in handlers {
            if handler(&payload as &dyn Any, self)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Replace the whole document and selection with `state`
    pub fn set_editor_state(&mut self, state: &EditorState) {
        let outgoing: Vec<(NodeKey, bool)> = self
            .pending
            .store
            .iter()
            .map(|(key, node)| (key.clone(), node.is_element()))
            .collect();
        self.pending.store = state.store().clone();
        self.pending.selection = state.selection().cloned();
        self.pending.cloned.clear();
        self.pending.full_reconcile = true;

        let incoming: Vec<(NodeKey, bool)> = state
            .store()
            .iter()
            .map(|(key, node)| (key.clone(), node.is_element()))
            .collect();
        for (key, is_element) in outgoing.into_iter().chain(incoming) {
            if is_element {
                self.pending.dirty_elements.insert(key, true);
            } else {
                self.pending.dirty_leaves.insert(key);
            }
        }
    }

    /// Replace the document with a single empty paragraph holding the caret
    pub fn clear(&mut self) -> EditorResult<()> {
        let root = NodeKey::root();
        for child in self.children(&root)? {
            self.detach(&child, true)?;
        }
        let paragraph = self.create_paragraph();
        self.append(&root, &[paragraph.clone()])?;
        self.select_caret(Point::element(paragraph, 0));
        Ok(())
    }
}

/// Where a point lands when the node it sits in is removed
fn removal_fallback(store: &NodeStore, parent: &NodeKey, index: usize) -> Point {
    let siblings = store.get(parent).map(Node::children).unwrap_or(&[]);
    if let Some(previous) = index.checked_sub(1).and_then(|i| siblings.get(i)) {
        if let Some(data) = store.get(previous).and_then(Node::text_data) {
            return Point::text(previous.clone(), data.len());
        }
    }
    if let Some(next) = siblings.get(index + 1) {
        if store.get(next).is_some_and(Node::is_text) {
            return Point::text(next.clone(), 0);
        }
    }
    Point::element(parent.clone(), index)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Harness owning everything a transaction borrows
    pub(crate) struct Fixture {
        pub(crate) committed: EditorState,
        pub(crate) pending: PendingState,
        pub(crate) keys: KeyGenerator,
        pub(crate) registry: RefCell<Registry>,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let committed = EditorState::new(NodeStore::new(), None);
            Self {
                pending: PendingState::from_state(&committed),
                committed,
                keys: KeyGenerator::new("test"),
                registry: RefCell::new(Registry::default()),
            }
        }

        pub(crate) fn tx(&mut self) -> Transaction<'_> {
            Transaction::new(&mut self.pending, &mut self.keys, &self.registry, &self.committed, true)
        }
    }

    #[test]
    fn test_writable_bumps_version_once() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let paragraph = tx.create_paragraph();
        tx.append(&NodeKey::root(), &[paragraph]).unwrap();
        let before = tx.root().unwrap().version;
        tx.writable(&NodeKey::root()).unwrap();
        tx.writable(&NodeKey::root()).unwrap();
        assert_eq!(tx.root().unwrap().version, before);
        assert_eq!(before, 1);
    }

    #[test]
    fn test_dirty_marks_propagate_to_ancestors() {
        let mut fixture = Fixture::new();
        let (paragraph, text) = {
            let mut tx = fixture.tx();
            let paragraph = tx.create_paragraph();
            let text = tx.create_text("hi");
            tx.append(&paragraph, &[text.clone()]).unwrap();
            tx.append(&NodeKey::root(), &[paragraph.clone()]).unwrap();
            (paragraph, text)
        };
        fixture.pending.dirty_elements.clear();
        fixture.pending.dirty_leaves.clear();

        let mut tx = fixture.tx();
        tx.set_text(&text, "ho").unwrap();
        assert!(fixture.pending.dirty_leaves.contains(&text));
        assert_eq!(fixture.pending.dirty_elements.get(&paragraph), Some(&false));
        assert_eq!(fixture.pending.dirty_elements.get(&NodeKey::root()), Some(&false));
    }

    #[test]
    fn test_writes_do_not_touch_the_committed_store() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let paragraph = tx.create_paragraph();
        tx.append(&NodeKey::root(), &[paragraph]).unwrap();
        assert!(fixture.committed.root().unwrap().children().is_empty());
        assert_eq!(fixture.pending.store.root().unwrap().children().len(), 1);
    }

    #[test]
    fn test_copy_node_has_no_children() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        let link = tx.create_element(ElementKind::Link {
            url: "https://example.com".to_string(),
        });
        let text = tx.create_text("x");
        tx.append(&link, &[text]).unwrap();
        let copy = tx.copy_node(&link).unwrap();
        assert_ne!(copy, link);
        assert!(tx.node(&copy).unwrap().children().is_empty());
        assert_eq!(tx.node(&copy).unwrap().element_kind(), tx.node(&link).unwrap().element_kind());
    }

    #[test]
    fn test_root_cannot_be_created() {
        let mut fixture = Fixture::new();
        let mut tx = fixture.tx();
        assert!(tx.create_node(NodeKind::Root(ElementData::default())).is_err());
    }
}
