//! # Selection
//!
//! Three selection shapes share one enum:
//!
//! - **Range**: anchor and focus points, each `(key, offset, type)`. Text
//!   points count characters, element points count children.
//! - **Node**: an explicit set of selected nodes (images, horizontal rules).
//! - **Grid**: a rectangle of table cells spanned by two corner cells.
//!
//! Points are only meaningful against the store of the state that owns the
//! selection. Everything here is read-only; mutating selection operations
//! live with the transaction that owns the pending store.

use crate::error::{ModelError, ModelResult};
use crate::format::{TextFormat, TextFormatType};
use crate::grid::GridSelection;
use crate::key::NodeKey;
use crate::node::NodeKind;
use crate::store::NodeStore;
use crate::traversal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointType {
    Text,
    Element,
}

/// A position in the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    #[serde(rename = "type")]
    pub point_type: PointType,
}

impl Point {
    pub fn text(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            point_type: PointType::Text,
        }
    }

    pub fn element(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            point_type: PointType::Element,
        }
    }

    pub fn is_text(&self) -> bool {
        self.point_type == PointType::Text
    }

    /// Totally ordered position: the node's child-index path followed by the
    /// offset. An element point at child `i` sorts just before anything
    /// inside child `i`.
    pub fn position(&self, store: &NodeStore) -> ModelResult<Vec<usize>> {
        let mut path = traversal::path_to(store, &self.key)
            .ok_or_else(|| ModelError::InvalidPoint(self.key.clone()))?;
        path.push(self.offset);
        Ok(path)
    }

    pub fn compare(&self, other: &Point, store: &NodeStore) -> ModelResult<Ordering> {
        Ok(self.position(store)?.cmp(&other.position(store)?))
    }

    pub fn is_before(&self, other: &Point, store: &NodeStore) -> ModelResult<bool> {
        Ok(self.compare(other, store)? == Ordering::Less)
    }

    /// Check that the point references a live node with an in-range offset
    pub fn validate(&self, store: &NodeStore) -> ModelResult<()> {
        let node = store
            .get(&self.key)
            .ok_or_else(|| ModelError::InvalidPoint(self.key.clone()))?;
        let in_range = match (&node.kind, self.point_type) {
            (NodeKind::Text(data), PointType::Text) => self.offset <= data.len(),
            (NodeKind::Root(data) | NodeKind::Element(_, data), PointType::Element) => {
                self.offset <= data.children.len()
            }
            _ => false,
        };
        if in_range {
            Ok(())
        } else {
            Err(ModelError::PointOutOfRange {
                key: self.key.clone(),
                offset: self.offset,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSelection {
    pub anchor: Point,
    pub focus: Point,
    /// Format applied to the next inserted text
    pub format: TextFormat,
    pub style: String,
}

impl RangeSelection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self {
            anchor,
            focus,
            format: TextFormat::empty(),
            style: String::new(),
        }
    }

    pub fn collapsed(point: Point) -> Self {
        Self::new(point.clone(), point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Focus precedes anchor in document order
    pub fn is_backward(&self, store: &NodeStore) -> ModelResult<bool> {
        self.focus.is_before(&self.anchor, store)
    }

    /// (start, end) in document order
    pub fn start_end(&self, store: &NodeStore) -> ModelResult<(&Point, &Point)> {
        if self.is_backward(store)? {
            Ok((&self.focus, &self.anchor))
        } else {
            Ok((&self.anchor, &self.focus))
        }
    }

    pub fn has_format(&self, ty: TextFormatType) -> bool {
        self.format.has(ty)
    }

    pub fn toggle_format(&mut self, ty: TextFormatType) {
        self.format = self.format.toggled(ty);
    }

    /// Nodes spanned by the selection in document order, including the
    /// containers entered or left along the way
    pub fn get_nodes(&self, store: &NodeStore) -> ModelResult<Vec<NodeKey>> {
        let (start, end) = self.start_end(store)?;
        let first = resolve_start_node(store, start)?;
        if self.is_collapsed() {
            return Ok(vec![first]);
        }
        let last = resolve_end_node(store, end)?;
        if first == last {
            return Ok(vec![first]);
        }
        match traversal::compare_document_order(store, &first, &last) {
            Some(Ordering::Greater) => nodes_between(store, &last, &first),
            _ => nodes_between(store, &first, &last),
        }
    }

    /// Selected text. Blocks are separated by a single newline.
    pub fn text_content(&self, store: &NodeStore) -> ModelResult<String> {
        let (start, end) = self.start_end(store)?;
        let nodes = self.get_nodes(store)?;
        let mut output = String::new();
        for (i, key) in nodes.iter().enumerate() {
            let node = store.require(key)?;
            match &node.kind {
                NodeKind::Text(data) => {
                    let from = if start.is_text() && &start.key == key {
                        start.offset
                    } else {
                        0
                    };
                    let to = if end.is_text() && &end.key == key {
                        end.offset
                    } else {
                        data.len()
                    };
                    output.extend(data.text.chars().skip(from).take(to.saturating_sub(from)));
                }
                NodeKind::LineBreak => output.push('\n'),
                NodeKind::Element(kind, _) if !kind.is_inline() && i > 0 && !output.is_empty() => {
                    output.push('\n');
                }
                _ => {}
            }
        }
        Ok(output)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeSelection {
    pub keys: BTreeSet<NodeKey>,
}

impl NodeSelection {
    pub fn new(keys: impl IntoIterator<Item = NodeKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn has(&self, key: &NodeKey) -> bool {
        self.keys.contains(key)
    }

    /// Selected nodes in document order
    pub fn get_nodes(&self, store: &NodeStore) -> ModelResult<Vec<NodeKey>> {
        let mut positioned = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let path = traversal::path_to(store, key)
                .ok_or_else(|| ModelError::InvalidPoint(key.clone()))?;
            positioned.push((path, key.clone()));
        }
        positioned.sort();
        Ok(positioned.into_iter().map(|(_, key)| key).collect())
    }

    pub fn text_content(&self, store: &NodeStore) -> ModelResult<String> {
        Ok(self
            .get_nodes(store)?
            .iter()
            .map(|key| traversal::text_content(store, key))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Range(RangeSelection),
    Node(NodeSelection),
    Grid(GridSelection),
}

impl Selection {
    pub fn as_range(&self) -> Option<&RangeSelection> {
        match self {
            Selection::Range(range) => Some(range),
            _ => None,
        }
    }

    pub fn as_range_mut(&mut self) -> Option<&mut RangeSelection> {
        match self {
            Selection::Range(range) => Some(range),
            _ => None,
        }
    }

    /// Every key the selection refers to
    pub fn referenced_keys(&self) -> Vec<&NodeKey> {
        match self {
            Selection::Range(range) => vec![&range.anchor.key, &range.focus.key],
            Selection::Node(nodes) => nodes.keys.iter().collect(),
            Selection::Grid(grid) => vec![&grid.grid_key, &grid.anchor_cell_key, &grid.focus_cell_key],
        }
    }

    pub fn get_nodes(&self, store: &NodeStore) -> ModelResult<Vec<NodeKey>> {
        match self {
            Selection::Range(range) => range.get_nodes(store),
            Selection::Node(nodes) => nodes.get_nodes(store),
            Selection::Grid(grid) => grid.get_nodes(store),
        }
    }

    pub fn text_content(&self, store: &NodeStore) -> ModelResult<String> {
        match self {
            Selection::Range(range) => range.text_content(store),
            Selection::Node(nodes) => nodes.text_content(store),
            Selection::Grid(grid) => grid.text_content(store),
        }
    }

    /// Every referenced key must resolve in `store`
    pub fn validate(&self, store: &NodeStore) -> ModelResult<()> {
        match self {
            Selection::Range(range) => {
                range.anchor.validate(store)?;
                range.focus.validate(store)
            }
            _ => {
                for key in self.referenced_keys() {
                    if !store.contains(key) {
                        return Err(ModelError::InvalidPoint(key.clone()));
                    }
                }
                Ok(())
            }
        }
    }
}

/// Node a start point sits on: the leaf at or after the point
pub fn resolve_start_node(store: &NodeStore, point: &Point) -> ModelResult<NodeKey> {
    let node = store
        .get(&point.key)
        .ok_or_else(|| ModelError::InvalidPoint(point.key.clone()))?;
    if point.is_text() || node.children().is_empty() {
        return Ok(point.key.clone());
    }
    let children = node.children();
    Ok(match children.get(point.offset) {
        Some(child) => traversal::first_leaf(store, child),
        None => traversal::last_leaf(store, &children[children.len() - 1]),
    })
}

/// Node an end point sits on: the leaf before the point. Element end points
/// exclude the child at their offset.
pub fn resolve_end_node(store: &NodeStore, point: &Point) -> ModelResult<NodeKey> {
    let node = store
        .get(&point.key)
        .ok_or_else(|| ModelError::InvalidPoint(point.key.clone()))?;
    if point.is_text() || node.children().is_empty() || point.offset == 0 {
        return Ok(point.key.clone());
    }
    let children = node.children();
    let index = point.offset.min(children.len()) - 1;
    Ok(traversal::last_leaf(store, &children[index]))
}

/// Nodes from `first` to `last` in document order. Ancestors of `first`
/// below the common ancestor come first, outermost first.
pub fn nodes_between(store: &NodeStore, first: &NodeKey, last: &NodeKey) -> ModelResult<Vec<NodeKey>> {
    let common = traversal::common_ancestor(store, first, last)
        .ok_or_else(|| ModelError::Detached(first.clone()))?;

    let mut result: Vec<NodeKey> = traversal::ancestors(store, first)
        .into_iter()
        .take_while(|k| k != &common)
        .collect();
    result.reverse();

    let mut order = vec![common.clone()];
    order.extend(traversal::descendants(store, &common));
    let from = order
        .iter()
        .position(|k| k == first)
        .ok_or_else(|| ModelError::Detached(first.clone()))?;
    let to = order
        .iter()
        .position(|k| k == last)
        .ok_or_else(|| ModelError::Detached(last.clone()))?;
    result.extend(order[from..=to].iter().cloned());
    Ok(result)
}
