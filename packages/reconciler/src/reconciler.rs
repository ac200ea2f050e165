//! # Reconciler
//!
//! Diffs two editor states and emits the DOM patches that turn the host DOM
//! of the first into the host DOM of the second.
//!
//! Only dirty nodes and the element paths leading to them are visited:
//!
//! - dirty leaf: the node itself changed
//! - dirty element `true`: the element itself changed
//! - dirty element `false`: something below the element changed
//!
//! Children are diffed by key. Keys kept in place are updated, keys that
//! changed index are moved (the longest increasing run of kept indices stays
//! put), new keys are created and missing keys destroyed. Selection is
//! applied last, once every node it may point into exists.

use crate::dom::{DomId, DomPatch, DomPoint};
use crate::error::{ReconcileError, ReconcileResult};
use crate::render::{host_shape, Theme};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};
use verso_model::{EditorState, NodeKey, NodeKind, NodeStore, Point, PointType, Selection};

/// Patches for one commit, plus a summary of what they do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub patches: Vec<DomPatch>,
    pub created: usize,
    pub updated: usize,
    pub moved: usize,
    pub destroyed: usize,
    /// Decorators mounted or changed in this pass, with their payloads
    pub decorators: Vec<(NodeKey, Value)>,
    pub removed_decorators: Vec<NodeKey>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Dirty sets produced by a transaction
#[derive(Debug, Clone, Copy)]
pub struct DirtySets<'a> {
    pub leaves: &'a HashSet<NodeKey>,
    pub elements: &'a HashMap<NodeKey, bool>,
    /// Compare node contents instead of versions. Set when a whole state
    /// was swapped in and versions of the two sides are unrelated.
    pub full: bool,
}

impl<'a> DirtySets<'a> {
    pub fn new(leaves: &'a HashSet<NodeKey>, elements: &'a HashMap<NodeKey, bool>) -> Self {
        Self {
            leaves,
            elements,
            full: false,
        }
    }

    pub fn full(mut self) -> Self {
        self.full = true;
        self
    }

    fn is_self_dirty(&self, key: &NodeKey) -> bool {
        self.leaves.contains(key) || self.elements.get(key).copied().unwrap_or(false)
    }

    fn is_subtree_dirty(&self, key: &NodeKey) -> bool {
        self.elements.contains_key(key)
    }

    fn touches(&self, key: &NodeKey) -> bool {
        self.leaves.contains(key) || self.elements.contains_key(key)
    }
}

struct Pass<'a> {
    prev: &'a NodeStore,
    next: &'a NodeStore,
    dirty: DirtySets<'a>,
    /// DOM ids overwritten by a re-creation during this pass
    replaced: HashMap<NodeKey, DomId>,
    outcome: ReconcileOutcome,
}

impl Pass<'_> {
    fn emit(&mut self, patch: DomPatch) {
        self.outcome.patches.push(patch);
    }
}

#[derive(Debug)]
pub struct Reconciler {
    root_dom: DomId,
    next_id: u32,
    key_to_dom: HashMap<NodeKey, DomId>,
    /// Inner text node of each text node's wrapper element
    text_dom: HashMap<NodeKey, DomId>,
    theme: Theme,
}

impl Reconciler {
    pub fn new(root_dom: DomId, theme: Theme) -> Self {
        let mut key_to_dom = HashMap::new();
        key_to_dom.insert(NodeKey::root(), root_dom);
        Self {
            root_dom,
            next_id: root_dom.0 + 1,
            key_to_dom,
            text_dom: HashMap::new(),
            theme,
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn dom_of(&self, key: &NodeKey) -> Option<DomId> {
        self.key_to_dom.get(key).copied()
    }

    /// Inner DOM text node of a text node
    pub fn text_dom_of(&self, key: &NodeKey) -> Option<DomId> {
        self.text_dom.get(key).copied()
    }

    pub fn mounted_count(&self) -> usize {
        self.key_to_dom.len() - 1
    }

    /// Create the whole document under an empty host root
    #[instrument(skip_all)]
    pub fn mount(&mut self, state: &EditorState) -> ReconcileResult<ReconcileOutcome> {
        self.key_to_dom.clear();
        self.key_to_dom.insert(NodeKey::root(), self.root_dom);
        self.text_dom.clear();

        let no_leaves = HashSet::new();
        let no_elements = HashMap::new();
        let mut pass = Pass {
            prev: state.store(),
            next: state.store(),
            dirty: DirtySets::new(&no_leaves, &no_elements),
            replaced: HashMap::new(),
            outcome: ReconcileOutcome::default(),
        };
        let root = state.store().require(&NodeKey::root())?;
        for child in root.children() {
            let dom = self.create_node(&mut pass, child)?;
            pass.emit(DomPatch::InsertChild {
                parent: self.root_dom,
                child: dom,
                before: None,
            });
        }
        self.apply_selection(&mut pass, None, state.selection(), true);
        debug!(created = pass.outcome.created, "mounted document");
        Ok(pass.outcome)
    }

    #[instrument(skip_all, fields(leaves = dirty.leaves.len(), elements = dirty.elements.len()))]
    pub fn reconcile(
        &mut self,
        prev: &EditorState,
        next: &EditorState,
        dirty: DirtySets<'_>,
    ) -> ReconcileResult<ReconcileOutcome> {
        let mut pass = Pass {
            prev: prev.store(),
            next: next.store(),
            dirty,
            replaced: HashMap::new(),
            outcome: ReconcileOutcome::default(),
        };

        let root = NodeKey::root();
        if dirty.is_subtree_dirty(&root) {
            let prev_children = prev.store().require(&root)?.children().to_vec();
            let next_children = next.store().require(&root)?.children().to_vec();
            self.reconcile_children(&mut pass, self.root_dom, &prev_children, &next_children)?;
        }

        let dom_changed = !pass.outcome.patches.is_empty();
        let selection_dirty = next
            .selection()
            .is_some_and(|s| s.referenced_keys().into_iter().any(|k| dirty.touches(k)));
        self.apply_selection(
            &mut pass,
            prev.selection(),
            next.selection(),
            dom_changed && selection_dirty,
        );

        debug!(
            patches = pass.outcome.patches.len(),
            created = pass.outcome.created,
            updated = pass.outcome.updated,
            moved = pass.outcome.moved,
            destroyed = pass.outcome.destroyed,
            "reconciled"
        );
        Ok(pass.outcome)
    }

    fn allocate(&mut self) -> DomId {
        let id = DomId(self.next_id);
        self.next_id += 1;
        id
    }

    fn bind(&mut self, pass: &mut Pass<'_>, key: &NodeKey, dom: DomId) {
        if let Some(old) = self.key_to_dom.insert(key.clone(), dom) {
            pass.replaced.entry(key.clone()).or_insert(old);
        }
    }

    /// Build the DOM subtree of a node from the next state. The returned
    /// element is detached; the caller inserts it.
    fn create_node(&mut self, pass: &mut Pass<'_>, key: &NodeKey) -> ReconcileResult<DomId> {
        let next = pass.next;
        let node = next.require(key)?;
        let shape = host_shape(node, &self.theme).ok_or_else(|| ReconcileError::MissingDom(key.clone()))?;
        let dom = self.allocate();
        pass.emit(DomPatch::CreateElement {
            id: dom,
            tag: shape.tag,
            attributes: shape.attributes,
        });
        self.bind(pass, key, dom);

        match &node.kind {
            NodeKind::Text(data) => {
                let text_dom = self.allocate();
                pass.emit(DomPatch::CreateText {
                    id: text_dom,
                    text: data.text.clone(),
                });
                pass.emit(DomPatch::InsertChild {
                    parent: dom,
                    child: text_dom,
                    before: None,
                });
                self.text_dom.insert(key.clone(), text_dom);
            }
            NodeKind::Element(_, data) => {
                for child in &data.children {
                    let child_dom = self.create_node(pass, child)?;
                    pass.emit(DomPatch::InsertChild {
                        parent: dom,
                        child: child_dom,
                        before: None,
                    });
                }
            }
            NodeKind::Decorator(data) => {
                pass.outcome.decorators.push((key.clone(), data.payload.clone()));
            }
            NodeKind::LineBreak | NodeKind::Root(_) => {}
        }
        pass.outcome.created += 1;
        Ok(dom)
    }

    /// Remove the DOM of a node that left `parent`, and forget every key of
    /// its previous subtree that no longer exists
    fn destroy_node(&mut self, pass: &mut Pass<'_>, key: &NodeKey) -> ReconcileResult<()> {
        let dom = pass
            .replaced
            .get(key)
            .copied()
            .or_else(|| self.dom_of(key))
            .ok_or_else(|| ReconcileError::MissingDom(key.clone()))?;
        pass.emit(DomPatch::RemoveNode { id: dom });

        let mut stack = vec![key.clone()];
        while let Some(current) = stack.pop() {
            let Some(node) = pass.prev.get(&current) else {
                continue;
            };
            stack.extend(node.children().iter().cloned());
            if pass.next.contains(&current) {
                continue;
            }
            self.key_to_dom.remove(&current);
            self.text_dom.remove(&current);
            if node.is_decorator() {
                pass.outcome.removed_decorators.push(current.clone());
            }
            pass.outcome.destroyed += 1;
        }
        Ok(())
    }

    /// Bring the DOM of a node present in both states up to date. Returns
    /// the node's DOM id, which changes when the host element is recreated.
    fn update_node(&mut self, pass: &mut Pass<'_>, key: &NodeKey, parent_dom: DomId) -> ReconcileResult<DomId> {
        let dom = self.dom_of(key).ok_or_else(|| ReconcileError::MissingDom(key.clone()))?;
        let self_dirty = pass.dirty.is_self_dirty(key);
        let subtree_dirty = pass.dirty.is_subtree_dirty(key);
        if !self_dirty && !subtree_dirty {
            return Ok(dom);
        }

        let (prev, next) = (pass.prev, pass.next);
        let prev_node = prev.require(key)?;
        let next_node = next.require(key)?;
        let changed = if pass.dirty.full {
            prev_node != next_node
        } else {
            prev_node.version != next_node.version || prev_node.children() != next_node.children()
        };
        if !changed && !subtree_dirty {
            return Ok(dom);
        }

        if changed {
            let prev_shape = host_shape(prev_node, &self.theme);
            let next_shape = host_shape(next_node, &self.theme);
            let same_variant = std::mem::discriminant(&prev_node.kind) == std::mem::discriminant(&next_node.kind);
            match (prev_shape, next_shape) {
                (Some(old), Some(new)) if !same_variant || old.tag != new.tag => {
                    let replacement = self.create_node(pass, key)?;
                    pass.emit(DomPatch::InsertChild {
                        parent: parent_dom,
                        child: replacement,
                        before: Some(dom),
                    });
                    pass.emit(DomPatch::RemoveNode { id: dom });
                    pass.outcome.updated += 1;
                    return Ok(replacement);
                }
                (Some(old), Some(new)) if old.attributes != new.attributes => {
                    pass.emit(DomPatch::SetAttributes {
                        id: dom,
                        attributes: new.attributes,
                    });
                }
                _ => {}
            }

            match (&prev_node.kind, &next_node.kind) {
                (NodeKind::Text(old), NodeKind::Text(new)) if old.text != new.text => {
                    let text_dom = self
                        .text_dom_of(key)
                        .ok_or_else(|| ReconcileError::MissingDom(key.clone()))?;
                    pass.emit(DomPatch::SetText {
                        id: text_dom,
                        text: new.text.clone(),
                    });
                }
                (NodeKind::Decorator(old), NodeKind::Decorator(new)) if old.payload != new.payload => {
                    pass.outcome.decorators.push((key.clone(), new.payload.clone()));
                }
                _ => {}
            }
            pass.outcome.updated += 1;
        }

        if next_node.is_element() && (subtree_dirty || prev_node.children() != next_node.children()) {
            let prev_children = prev_node.children().to_vec();
            let next_children = next_node.children().to_vec();
            self.reconcile_children(pass, dom, &prev_children, &next_children)?;
        }
        Ok(dom)
    }

    fn reconcile_children(
        &mut self,
        pass: &mut Pass<'_>,
        parent_dom: DomId,
        prev_children: &[NodeKey],
        next_children: &[NodeKey],
    ) -> ReconcileResult<()> {
        if prev_children == next_children {
            for child in next_children {
                self.update_node(pass, child, parent_dom)?;
            }
            return Ok(());
        }

        let prev_index: HashMap<&NodeKey, usize> = prev_children.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let next_set: HashSet<&NodeKey> = next_children.iter().collect();

        for child in prev_children {
            if !next_set.contains(child) {
                self.destroy_node(pass, child)?;
            }
        }

        // Kept children that keep their relative order stay where they are
        let kept: Vec<usize> = next_children
            .iter()
            .filter_map(|k| prev_index.get(k).copied())
            .collect();
        let stable: HashSet<usize> = longest_increasing_subsequence(&kept)
            .into_iter()
            .map(|i| kept[i])
            .collect();

        let mut before: Option<DomId> = None;
        for child in next_children.iter().rev() {
            let dom = match prev_index.get(child) {
                None => {
                    let dom = self.create_node(pass, child)?;
                    pass.emit(DomPatch::InsertChild {
                        parent: parent_dom,
                        child: dom,
                        before,
                    });
                    dom
                }
                Some(index) => {
                    let dom = self.update_node(pass, child, parent_dom)?;
                    if !stable.contains(index) {
                        pass.emit(DomPatch::MoveChild {
                            parent: parent_dom,
                            child: dom,
                            before,
                        });
                        pass.outcome.moved += 1;
                    }
                    dom
                }
            };
            before = Some(dom);
        }
        Ok(())
    }

    fn resolve_point(&self, point: &Point) -> Option<DomPoint> {
        let node = match point.point_type {
            PointType::Text => self.text_dom_of(&point.key)?,
            PointType::Element => self.dom_of(&point.key)?,
        };
        Some(DomPoint {
            node,
            offset: point.offset,
        })
    }

    fn apply_selection(&self, pass: &mut Pass<'_>, prev: Option<&Selection>, next: Option<&Selection>, force: bool) {
        if prev == next && !force {
            return;
        }
        let resolved = next
            .and_then(Selection::as_range)
            .and_then(|range| Some((self.resolve_point(&range.anchor)?, self.resolve_point(&range.focus)?)));
        match resolved {
            Some((anchor, focus)) => pass.emit(DomPatch::SetSelection { anchor, focus }),
            None if prev.and_then(Selection::as_range).is_some() => pass.emit(DomPatch::ClearSelection),
            None => {}
        }
    }
}

/// Indices (into `seq`) of one longest strictly increasing subsequence
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k]: index of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, value) in seq.iter().enumerate() {
        let position = tails.partition_point(|&t| seq[t] < *value);
        if position > 0 {
            predecessor[i] = Some(tails[position - 1]);
        }
        if position == tails.len() {
            tails.push(i);
        } else {
            tails[position] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut current = tails.last().copied();
    while let Some(i) = current {
        result.push(i);
        current = predecessor[i];
    }
    result.reverse();
    result
}
