//! # Selection Editing
//!
//! Editing operations driven by the current selection: typing, deletion,
//! paragraph and line breaks, pasting nodes, formatting and indentation.
//!
//! Deleting a range works on its two boundary nodes:
//!
//! ```text
//! <p>He[llo</p><p>wor]ld</p>
//!   first: "Hello" cut at 2     last: "world" cut at 3
//!   trim both, drop everything fully inside, merge the last block into
//!   the first  →  <p>He|ld</p>
//! ```

use crate::errors::{EditorError, EditorResult};
use crate::text::byte_index;
use crate::transaction::Transaction;
use std::cmp::Ordering;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;
use verso_model::selection::nodes_between;
use verso_model::traversal;
use verso_model::{
    plan_grid_merge, ElementFormat, ElementKind, Node, NodeKey, NodeKind, NodeStore, Point, Selection, TableMap,
    TextData, TextFormatType, TextMode,
};

/// How far a deletion reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteUnit {
    Character,
    Word,
    Line,
}

/// Where a deletion boundary falls on its boundary node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cut {
    /// Character offset in a text node
    Text(usize),
    /// Immediately before the node
    Before,
    /// Immediately after the node
    After,
    /// Inside an empty element
    Inside,
}

fn cut_at_start(store: &NodeStore, leaf: &NodeKey) -> Cut {
    match store.get(leaf).map(|n| &n.kind) {
        Some(NodeKind::Text(_)) => Cut::Text(0),
        Some(NodeKind::Element(..) | NodeKind::Root(_)) => Cut::Inside,
        _ => Cut::Before,
    }
}

fn cut_at_end(store: &NodeStore, leaf: &NodeKey) -> Cut {
    match store.get(leaf).map(|n| &n.kind) {
        Some(NodeKind::Text(data)) => Cut::Text(data.len()),
        Some(NodeKind::Element(..) | NodeKind::Root(_)) => Cut::Inside,
        _ => Cut::After,
    }
}

fn start_boundary(store: &NodeStore, point: &Point) -> EditorResult<(NodeKey, Cut)> {
    let node = store
        .get(&point.key)
        .ok_or_else(|| EditorError::InvalidSelection(format!("missing node {}", point.key)))?;
    if point.is_text() {
        return Ok((point.key.clone(), Cut::Text(point.offset)));
    }
    let children = node.children();
    if children.is_empty() {
        return Ok((point.key.clone(), Cut::Inside));
    }
    Ok(match children.get(point.offset) {
        Some(child) => {
            let leaf = traversal::first_leaf(store, child);
            let cut = cut_at_start(store, &leaf);
            (leaf, cut)
        }
        None => {
            let leaf = traversal::last_leaf(store, &children[children.len() - 1]);
            let cut = cut_at_end(store, &leaf);
            (leaf, cut)
        }
    })
}

fn end_boundary(store: &NodeStore, point: &Point) -> EditorResult<(NodeKey, Cut)> {
    let node = store
        .get(&point.key)
        .ok_or_else(|| EditorError::InvalidSelection(format!("missing node {}", point.key)))?;
    if point.is_text() {
        return Ok((point.key.clone(), Cut::Text(point.offset)));
    }
    let children = node.children();
    if children.is_empty() {
        return Ok((point.key.clone(), Cut::Inside));
    }
    if point.offset == 0 {
        let leaf = traversal::first_leaf(store, &children[0]);
        let cut = cut_at_start(store, &leaf);
        return Ok((leaf, cut));
    }
    let leaf = traversal::last_leaf(store, &children[point.offset.min(children.len()) - 1]);
    let cut = cut_at_end(store, &leaf);
    Ok((leaf, cut))
}

/// Element point just before (`after == false`) or after a node
fn point_beside(store: &NodeStore, key: &NodeKey, after: bool) -> Point {
    match (store.get(key).and_then(|n| n.parent.clone()), traversal::index_in_parent(store, key)) {
        (Some(parent), Some(index)) => Point::element(parent, if after { index + 1 } else { index }),
        _ => Point::element(key.clone(), 0),
    }
}

/// Point at the very start of a subtree
pub fn start_point(store: &NodeStore, key: &NodeKey) -> Point {
    let leaf = traversal::first_leaf(store, key);
    match store.get(&leaf).map(|n| &n.kind) {
        Some(NodeKind::Text(_)) => Point::text(leaf, 0),
        Some(NodeKind::Element(..) | NodeKind::Root(_)) => Point::element(leaf, 0),
        _ => point_beside(store, &leaf, false),
    }
}

/// Point at the very end of a subtree
pub fn end_point(store: &NodeStore, key: &NodeKey) -> Point {
    let leaf = traversal::last_leaf(store, key);
    match store.get(&leaf).map(|n| &n.kind) {
        Some(NodeKind::Text(data)) => Point::text(leaf, data.len()),
        Some(NodeKind::Element(_, data) | NodeKind::Root(data)) => Point::element(leaf, data.children.len()),
        _ => point_beside(store, &leaf, true),
    }
}

/// Equivalent text point for an element point sitting next to text
fn prefer_text_point(store: &NodeStore, point: Point) -> Point {
    if point.is_text() {
        return point;
    }
    let Some(children) = store.get(&point.key).map(Node::children) else {
        return point;
    };
    if let Some(previous) = point.offset.checked_sub(1).and_then(|i| children.get(i)) {
        if let Some(data) = store.get(previous).and_then(Node::text_data) {
            return Point::text(previous.clone(), data.len());
        }
    }
    if let Some(next) = children.get(point.offset) {
        if store.get(next).is_some_and(Node::is_text) {
            return Point::text(next.clone(), 0);
        }
    }
    point
}

/// Nearest table cell around a node; deletion never crosses one
fn shadow_root(store: &NodeStore, key: &NodeKey) -> Option<NodeKey> {
    std::iter::once(key.clone())
        .chain(traversal::ancestors(store, key))
        .find(|k| store.get(k).and_then(Node::element_kind).is_some_and(ElementKind::is_shadow_root))
}

fn previous_grapheme(text: &str, offset: usize) -> usize {
    let byte = byte_index(text, offset);
    let start = text[..byte].grapheme_indices(true).next_back().map(|(i, _)| i).unwrap_or(0);
    text[..start].chars().count()
}

fn next_grapheme(text: &str, offset: usize) -> usize {
    let byte = byte_index(text, offset);
    let end = text[byte..].graphemes(true).next().map(|g| byte + g.len()).unwrap_or(text.len());
    text[..end].chars().count()
}

/// Start of the word before `offset`, skipping whitespace first
fn previous_word(text: &str, offset: usize) -> usize {
    let head = &text[..byte_index(text, offset)];
    let start = head
        .split_word_bound_indices()
        .rev()
        .find(|(_, segment)| !segment.trim().is_empty())
        .map(|(i, _)| i)
        .unwrap_or(0);
    head[..start].chars().count()
}

/// End of the word after `offset`, skipping whitespace first
fn next_word(text: &str, offset: usize) -> usize {
    let byte = byte_index(text, offset);
    let end = text[byte..]
        .split_word_bound_indices()
        .find(|(_, segment)| !segment.trim().is_empty())
        .map(|(i, segment)| byte + i + segment.len())
        .unwrap_or(text.len());
    text[..end].chars().count()
}

impl Transaction<'_> {
    // -----------------------------------------------------------------------
    // Queries

    /// Nodes covered by the current selection, in document order
    pub fn selected_nodes(&self) -> EditorResult<Vec<NodeKey>> {
        match self.selection() {
            Some(selection) => Ok(selection.get_nodes(self.store())?),
            None => Ok(Vec::new()),
        }
    }

    pub fn selected_text(&self) -> EditorResult<String> {
        match self.selection() {
            Some(selection) => Ok(selection.text_content(self.store())?),
            None => Ok(String::new()),
        }
    }

    pub fn is_backward(&self) -> EditorResult<bool> {
        Ok(self.range()?.is_backward(self.store())?)
    }

    /// Blocks holding the selected content
    pub fn selected_blocks(&self) -> EditorResult<Vec<NodeKey>> {
        let store = self.store();
        let mut blocks: Vec<NodeKey> = Vec::new();
        for key in self.selected_nodes()? {
            let node = self.node(&key)?;
            if node.is_element() && !node.children().is_empty() {
                continue;
            }
            if let Some(block) = traversal::nearest_block(store, &key) {
                if !block.is_root() && !blocks.contains(&block) {
                    blocks.push(block);
                }
            }
        }
        Ok(blocks)
    }

    pub fn select_all(&mut self) -> EditorResult<()> {
        let root = NodeKey::root();
        let children = self.children(&root)?;
        let (Some(first), Some(last)) = (children.first(), children.last()) else {
            self.select_caret(Point::element(root, 0));
            return Ok(());
        };
        let anchor = start_point(self.store(), first);
        let focus = end_point(self.store(), last);
        self.select(anchor, focus);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Typing and deletion

    /// Replace the selection with `text`. Text lands in the node under the
    /// caret when its format matches the selection's, otherwise in a new
    /// text node carrying the selection format.
    pub fn insert_text(&mut self, text: &str) -> EditorResult<()> {
        if !self.range()?.is_collapsed() {
            self.remove_text()?;
        }
        if text.is_empty() {
            return Ok(());
        }
        let range = self.range()?;
        let point = range.anchor.clone();
        let inserted = text.chars().count();
        let fresh_data = TextData {
            text: text.to_string(),
            format: range.format,
            style: range.style.clone(),
            mode: TextMode::Normal,
        };

        if point.is_text() {
            let data = self.text(&point.key)?;
            let len = data.len();
            let matches = data.format == range.format && data.style == range.style;
            let mode = data.mode;
            if matches && mode != TextMode::Token {
                if mode == TextMode::Segmented {
                    self.set_text_mode(&point.key, TextMode::Normal)?;
                }
                return self.splice_text(&point.key, point.offset, 0, text, true);
            }

            let fresh = self.create_text_with(fresh_data);
            if point.offset == 0 {
                self.insert_before(&point.key, &fresh)?;
            } else if point.offset >= len {
                self.insert_after(&point.key, &fresh)?;
            } else {
                let fragments = self.split_text(&point.key, &[point.offset])?;
                self.insert_after(&fragments[0], &fresh)?;
            }
            self.move_caret(Point::text(fresh, inserted));
            return Ok(());
        }

        let (container, index) = self.inline_container(&point.key, point.offset)?;
        let fresh = self.create_text_with(fresh_data);
        self.insert_child(&container, index, &fresh)?;
        self.move_caret(Point::text(fresh, inserted));
        Ok(())
    }

    /// Delete the selected content and collapse the selection to its start
    pub fn remove_text(&mut self) -> EditorResult<()> {
        let range = self.range()?;
        if range.is_collapsed() {
            return Ok(());
        }
        let (start, end) = {
            let (start, end) = range.start_end(self.store())?;
            (start.clone(), end.clone())
        };
        self.delete_between(&start, &end)
    }

    pub fn delete_character(&mut self, backward: bool) -> EditorResult<()> {
        self.delete_by(DeleteUnit::Character, backward)
    }

    pub fn delete_word(&mut self, backward: bool) -> EditorResult<()> {
        self.delete_by(DeleteUnit::Word, backward)
    }

    pub fn delete_line(&mut self, backward: bool) -> EditorResult<()> {
        self.delete_by(DeleteUnit::Line, backward)
    }

    fn delete_by(&mut self, unit: DeleteUnit, backward: bool) -> EditorResult<()> {
        let range = self.range()?;
        if !range.is_collapsed() {
            return self.remove_text();
        }
        let point = range.anchor;

        // Token text is deleted as a whole
        if point.is_text() {
            let data = self.text(&point.key)?;
            let inside = if backward {
                point.offset > 0
            } else {
                point.offset < data.len()
            };
            if data.mode == TextMode::Token && inside {
                return self.remove(&point.key);
            }
        }

        let target = match unit {
            DeleteUnit::Character => self.step_character(&point, backward)?,
            DeleteUnit::Word => match self.step_word(&point, backward)? {
                Some(target) => Some(target),
                None => self.step_character(&point, backward)?,
            },
            DeleteUnit::Line => match self.step_line(&point, backward)? {
                Some(target) => Some(target),
                None => self.step_character(&point, backward)?,
            },
        };
        match target {
            Some(target) if backward => self.delete_between(&target, &point),
            Some(target) => self.delete_between(&point, &target),
            None if backward => self.collapse_at_start(&point),
            None => Ok(()),
        }
    }

    /// One grapheme away from `point`, crossing into the neighbouring
    /// node or block when at an edge
    fn step_character(&self, point: &Point, backward: bool) -> EditorResult<Option<Point>> {
        if point.is_text() {
            let data = self.text(&point.key)?;
            if backward && point.offset > 0 {
                return Ok(Some(Point::text(point.key.clone(), previous_grapheme(&data.text, point.offset))));
            }
            if !backward && point.offset < data.len() {
                return Ok(Some(Point::text(point.key.clone(), next_grapheme(&data.text, point.offset))));
            }
        }
        let store = self.store();
        let Some(mut neighbour) = self.leaf_beside(point, backward)? else {
            return Ok(None);
        };
        // Empty text has nothing to delete
        while store.get(&neighbour).and_then(Node::text_data).is_some_and(TextData::is_empty) {
            let next = if backward {
                traversal::previous_leaf(store, &neighbour)
            } else {
                traversal::next_leaf(store, &neighbour)
            };
            match next {
                Some(next) => neighbour = next,
                None => return Ok(None),
            }
        }

        let node = self.node(&neighbour)?;
        if shadow_root(store, &neighbour) != shadow_root(store, &point.key) {
            return Ok(None);
        }
        let same_block = traversal::nearest_block(store, &neighbour) == traversal::nearest_block(store, &point.key);
        let block_decorator = node.is_decorator() && !node.is_inline();

        Ok(Some(match &node.kind {
            NodeKind::Text(data) if same_block => {
                if backward {
                    Point::text(neighbour.clone(), previous_grapheme(&data.text, data.len()))
                } else {
                    Point::text(neighbour.clone(), next_grapheme(&data.text, 0))
                }
            }
            NodeKind::Text(data) => {
                // Block boundary: reach the edge of the neighbouring block
                if backward {
                    Point::text(neighbour.clone(), data.len())
                } else {
                    Point::text(neighbour.clone(), 0)
                }
            }
            NodeKind::Element(..) | NodeKind::Root(_) => Point::element(neighbour.clone(), 0),
            _ if same_block || block_decorator => point_beside(store, &neighbour, !backward),
            _ => point_beside(store, &neighbour, backward),
        }))
    }

    /// Leaf adjacent to a point at a node edge
    fn leaf_beside(&self, point: &Point, backward: bool) -> EditorResult<Option<NodeKey>> {
        let store = self.store();
        if point.is_text() {
            return Ok(if backward {
                traversal::previous_leaf(store, &point.key)
            } else {
                traversal::next_leaf(store, &point.key)
            });
        }
        let children = self.node(&point.key)?.children();
        Ok(if backward {
            match point.offset.checked_sub(1).and_then(|i| children.get(i)) {
                Some(child) => Some(traversal::last_leaf(store, child)),
                None => traversal::previous_leaf(store, &point.key),
            }
        } else {
            match children.get(point.offset) {
                Some(child) => Some(traversal::first_leaf(store, child)),
                None => traversal::next_leaf(store, &point.key),
            }
        })
    }

    fn step_word(&self, point: &Point, backward: bool) -> EditorResult<Option<Point>> {
        if !point.is_text() {
            return Ok(None);
        }
        let data = self.text(&point.key)?;
        let target = if backward {
            previous_word(&data.text, point.offset)
        } else {
            next_word(&data.text, point.offset)
        };
        Ok((target != point.offset).then(|| Point::text(point.key.clone(), target)))
    }

    fn step_line(&self, point: &Point, backward: bool) -> EditorResult<Option<Point>> {
        let store = self.store();
        let Some(block) = traversal::nearest_block(store, &point.key) else {
            return Ok(None);
        };
        if block.is_root() {
            return Ok(None);
        }
        let target = if backward {
            start_point(store, &block)
        } else {
            end_point(store, &block)
        };
        let same = target.compare(point, store)? == Ordering::Equal;
        Ok((!same).then_some(target))
    }

    /// Backspace at the very start of the document: headings and quotes
    /// turn back into paragraphs
    fn collapse_at_start(&mut self, point: &Point) -> EditorResult<()> {
        let Some(block) = traversal::nearest_block(self.store(), &point.key) else {
            return Ok(());
        };
        let data = match &self.node(&block)?.kind {
            NodeKind::Element(ElementKind::Heading { .. } | ElementKind::Quote, data) => data.clone(),
            _ => return Ok(()),
        };
        let paragraph = self.create_paragraph();
        {
            let element = self.writable_element(&paragraph)?;
            element.format = data.format;
            element.indent = data.indent;
            element.direction = data.direction;
        }
        self.replace(&block, &paragraph, true)
    }

    /// Delete everything between two points in document order
    fn delete_between(&mut self, start: &Point, end: &Point) -> EditorResult<()> {
        let store = self.store();
        let (first, first_cut) = start_boundary(store, start)?;
        let (last, last_cut) = end_boundary(store, end)?;

        if first == last {
            if let (Cut::Text(a), Cut::Text(b)) = (first_cut, last_cut) {
                let (a, b) = (a.min(b), a.max(b));
                self.splice_text(&first, a, b - a, "", false)?;
                self.move_caret(Point::text(first, a));
                return Ok(());
            }
        }

        let caret = match first_cut {
            Cut::Text(a) => Point::text(first.clone(), a),
            Cut::Inside => Point::element(first.clone(), 0),
            Cut::Before => point_beside(store, &first, false),
            Cut::After => point_beside(store, &first, true),
        };
        if traversal::compare_document_order(store, &first, &last) == Some(Ordering::Greater) {
            self.move_caret(caret);
            return Ok(());
        }

        let nodes = nodes_between(store, &first, &last)?;
        let mut protected: HashSet<NodeKey> = HashSet::new();
        for key in [&first, &last] {
            protected.insert(key.clone());
            protected.extend(traversal::ancestors(store, key));
        }
        let first_block = traversal::nearest_block(store, &first);
        let last_block = traversal::nearest_block(store, &last);

        // Trim the boundary nodes
        match first_cut {
            Cut::Text(a) => {
                let len = self.text_len(&first);
                self.splice_text(&first, a, len.saturating_sub(a), "", false)?;
            }
            Cut::Before if first != last => self.detach(&first, true)?,
            _ => {}
        }
        match last_cut {
            Cut::Text(b) => self.splice_text(&last, 0, b, "", false)?,
            Cut::After => self.detach(&last, true)?,
            _ => {}
        }

        // Drop everything fully inside
        for key in &nodes {
            if protected.contains(key) || !self.is_attached(key) {
                continue;
            }
            self.detach(key, true)?;
        }

        if let (Some(first_block), Some(last_block)) = (first_block, last_block) {
            self.merge_blocks(&first_block, &last_block)?;
        }

        let caret = if caret.validate(self.store()).is_ok() && self.is_attached(&caret.key) {
            prefer_text_point(self.store(), caret)
        } else {
            match self.range_selection() {
                Some(range) => range.anchor.clone(),
                None => return Ok(()),
            }
        };
        self.move_caret(caret);
        Ok(())
    }

    /// Pull the content of `last` into `first` after a deletion across them
    fn merge_blocks(&mut self, first: &NodeKey, last: &NodeKey) -> EditorResult<()> {
        let store = self.store();
        if first == last
            || first.is_root()
            || last.is_root()
            || !self.is_attached(first)
            || !self.is_attached(last)
            || traversal::is_ancestor_of(store, first, last)
            || traversal::is_ancestor_of(store, last, first)
            || shadow_root(store, first) != shadow_root(store, last)
        {
            return Ok(());
        }
        self.move_children(last, first)?;
        self.remove(last)
    }

    // -----------------------------------------------------------------------
    // Breaks and insertion

    /// Split the block at the caret. Returns the new block holding the
    /// content after the caret.
    pub fn insert_paragraph(&mut self) -> EditorResult<NodeKey> {
        if !self.range()?.is_collapsed() {
            self.remove_text()?;
        }
        let point = self.range()?.anchor;
        let (block, index) = self.split_at_point(&point, true)?;

        if block.is_root() {
            let paragraph = self.create_paragraph();
            self.insert_child(&block, index, &paragraph)?;
            self.move_caret(Point::element(paragraph.clone(), 0));
            return Ok(paragraph);
        }

        let (kind, data) = match &self.node(&block)?.kind {
            NodeKind::Element(kind, data) => (kind.clone(), data.clone()),
            _ => return Err(EditorError::NotAnElement(block)),
        };
        let children = self.children(&block)?;
        let splits_content = index > 0 && index < children.len();
        let new_kind = match &kind {
            ElementKind::Heading { .. } if splits_content => kind.clone(),
            other => other.kind_after_break(),
        };
        let new_block = self.create_element(new_kind);
        {
            let element = self.writable_element(&new_block)?;
            element.format = data.format;
            element.indent = data.indent;
            element.direction = data.direction;
        }

        // At the start of a non-empty block the new block goes before it
        if index == 0 && !children.is_empty() {
            self.insert_before(&block, &new_block)?;
            let caret = start_point(self.store(), &block);
            self.move_caret(caret);
            return Ok(new_block);
        }

        self.insert_after(&block, &new_block)?;
        self.append(&new_block, &children[index.min(children.len())..])?;
        let caret = start_point(self.store(), &new_block);
        self.move_caret(caret);
        Ok(new_block)
    }

    /// Insert a line break at the caret. With `select_start` the caret
    /// stays before the break.
    pub fn insert_line_break(&mut self, select_start: bool) -> EditorResult<()> {
        if !self.range()?.is_collapsed() {
            self.remove_text()?;
        }
        let point = self.range()?.anchor;
        let (container, index) = self.split_at_point(&point, false)?;
        let (container, index) = self.inline_container(&container, index)?;
        let line_break = self.create_line_break();
        self.insert_child(&container, index, &line_break)?;
        let offset = if select_start { index } else { index + 1 };
        let caret = prefer_text_point(self.store(), Point::element(container, offset));
        self.move_caret(caret);
        Ok(())
    }

    /// Insert detached nodes at the selection. Inline nodes go into the
    /// block at the caret; block nodes split it, with runs of inline nodes
    /// wrapped in paragraphs.
    pub fn insert_nodes(&mut self, nodes: &[NodeKey]) -> EditorResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        if !self.range()?.is_collapsed() {
            self.remove_text()?;
        }
        let point = self.range()?.anchor;

        let mut all_inline = true;
        for key in nodes {
            all_inline &= self.node(key)?.is_inline();
        }

        if all_inline {
            let (container, index) = self.split_at_point(&point, false)?;
            let (container, mut index) = self.inline_container(&container, index)?;
            for key in nodes {
                self.insert_child(&container, index, key)?;
                index += 1;
            }
            let caret = prefer_text_point(self.store(), Point::element(container, index));
            let caret = match nodes.last() {
                Some(last) if self.node(last)?.is_text() => end_point(self.store(), last),
                _ => caret,
            };
            self.move_caret(caret);
            return Ok(());
        }

        let (block, index) = self.split_at_point(&point, true)?;
        let (parent, mut at) = if block.is_root() {
            (block.clone(), index)
        } else {
            let children = self.children(&block)?;
            if index > 0 && index < children.len() {
                let tail = self.copy_node(&block)?;
                self.insert_after(&block, &tail)?;
                self.append(&tail, &children[index..])?;
            }
            let position = self.index_of(&block)?;
            let at = if index == 0 && !children.is_empty() {
                position
            } else {
                position + 1
            };
            (self.parent_key(&block)?, at)
        };

        let mut wrapper: Option<NodeKey> = None;
        for key in nodes {
            if self.node(key)?.is_inline() {
                let paragraph = match &wrapper {
                    Some(paragraph) => paragraph.clone(),
                    None => {
                        let paragraph = self.create_paragraph();
                        self.insert_child(&parent, at, &paragraph)?;
                        at += 1;
                        wrapper = Some(paragraph.clone());
                        paragraph
                    }
                };
                self.append(&paragraph, std::slice::from_ref(key))?;
            } else {
                wrapper = None;
                self.insert_child(&parent, at, key)?;
                at += 1;
            }
        }

        // An empty block the caret sat in is replaced by the insertion
        if !block.is_root() && self.is_attached(&block) && self.children(&block)?.is_empty() {
            self.remove(&block)?;
        }
        if let Some(last) = nodes.last() {
            let last = match self.node(last)?.is_inline() {
                true => self.parent_key(last)?,
                false => last.clone(),
            };
            let caret = end_point(self.store(), &last);
            self.move_caret(caret);
        }
        Ok(())
    }

    /// Turn a point into a (container, child index) insertion position,
    /// splitting the text node under it. With `lift`, inline elements
    /// around the position are split too so the container is a block or
    /// the root.
    fn split_at_point(&mut self, point: &Point, lift: bool) -> EditorResult<(NodeKey, usize)> {
        let (mut container, mut index) = if point.is_text() {
            let len = self.text_len(&point.key);
            let parent = self.parent_key(&point.key)?;
            if point.offset == 0 {
                (parent, self.index_of(&point.key)?)
            } else if point.offset >= len {
                (parent, self.index_of(&point.key)? + 1)
            } else {
                self.split_text(&point.key, &[point.offset])?;
                (parent, self.index_of(&point.key)? + 1)
            }
        } else {
            (point.key.clone(), point.offset)
        };

        while lift {
            let node = self.node(&container)?;
            if node.is_root() || node.is_block_element() {
                break;
            }
            let children = node.children().to_vec();
            let parent = self.parent_key(&container)?;
            let position = self.index_of(&container)?;
            if index > 0 && index < children.len() {
                let copy = self.copy_node(&container)?;
                self.insert_after(&container, &copy)?;
                self.append(&copy, &children[index..])?;
            }
            index = if index == 0 { position } else { position + 1 };
            container = parent;
        }
        Ok((container, index))
    }

    /// Inline content cannot sit at the root: wrap the position in a new
    /// paragraph there
    fn inline_container(&mut self, container: &NodeKey, index: usize) -> EditorResult<(NodeKey, usize)> {
        if !self.node(container)?.is_root() {
            return Ok((container.clone(), index));
        }
        let paragraph = self.create_paragraph();
        self.insert_child(container, index, &paragraph)?;
        Ok((paragraph, 0))
    }

    // -----------------------------------------------------------------------
    // Formatting

    /// Split the boundary text nodes so the selection covers whole nodes.
    /// Returns the selected nodes; the selection is moved onto them.
    pub fn extract(&mut self) -> EditorResult<Vec<NodeKey>> {
        let range = self.range()?;
        let mut nodes = range.get_nodes(self.store())?;
        if range.is_collapsed() {
            return Ok(nodes);
        }
        let backward = range.is_backward(self.store())?;
        let (mut start, mut end) = {
            let (start, end) = range.start_end(self.store())?;
            (start.clone(), end.clone())
        };

        if end.is_text() && end.offset > 0 && end.offset < self.text_len(&end.key) {
            self.split_text(&end.key, &[end.offset])?;
        }
        if start.is_text() && start.offset > 0 && start.offset < self.text_len(&start.key) {
            let fragments = self.split_text(&start.key, &[start.offset])?;
            let right = fragments[fragments.len() - 1].clone();
            for key in nodes.iter_mut() {
                if key == &start.key {
                    *key = right.clone();
                }
            }
            if end.key == start.key {
                end = Point::text(right.clone(), end.offset - start.offset);
            }
            start = Point::text(right, 0);
        }

        // Boundary nodes contributing nothing
        if nodes.len() > 1 && start.is_text() && start.offset == self.text_len(&start.key) && start.offset > 0 {
            nodes.retain(|k| k != &start.key);
        }
        if nodes.len() > 1 && end.is_text() && end.offset == 0 {
            nodes.retain(|k| k != &end.key);
        }

        let format = range.format;
        let style = range.style.clone();
        if let Some(selection) = self.range_mut() {
            let (anchor, focus) = if backward { (end, start) } else { (start, end) };
            selection.anchor = anchor;
            selection.focus = focus;
            selection.format = format;
            selection.style = style;
        }
        Ok(nodes)
    }

    /// Toggle a text format. A collapsed selection only changes the format
    /// of the next typed text; otherwise every selected text node follows
    /// the toggled state of the first one.
    pub fn format_text(&mut self, ty: TextFormatType) -> EditorResult<()> {
        let range = self.range()?;
        if range.is_collapsed() {
            if let Some(selection) = self.range_mut() {
                selection.toggle_format(ty);
            }
            return Ok(());
        }

        let nodes = self.extract()?;
        let mut texts = Vec::new();
        for key in nodes {
            if self.node(&key)?.is_text() {
                texts.push(key);
            }
        }
        let Some(first) = texts.first() else {
            if let Some(selection) = self.range_mut() {
                selection.toggle_format(ty);
            }
            return Ok(());
        };

        let enable = !self.text(first)?.format.has(ty);
        for key in &texts {
            let format = self.text(key)?.format;
            if format.has(ty) != enable {
                self.set_text_format(key, format.toggled(ty))?;
            }
        }
        let first_format = self.text(first)?.format;
        if let Some(selection) = self.range_mut() {
            selection.format = first_format;
        }
        Ok(())
    }

    pub fn format_element(&mut self, format: ElementFormat) -> EditorResult<()> {
        for block in self.selected_blocks()? {
            self.writable_element(&block)?.format = format;
        }
        Ok(())
    }

    pub fn indent(&mut self) -> EditorResult<()> {
        for block in self.selected_blocks()? {
            self.writable_element(&block)?.indent += 1;
        }
        Ok(())
    }

    pub fn outdent(&mut self) -> EditorResult<()> {
        for block in self.selected_blocks()? {
            let indent = self.node(&block)?.element().map(|e| e.indent).unwrap_or(0);
            if indent > 0 {
                self.writable_element(&block)?.indent = indent - 1;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Node and grid selections

    /// Remove the nodes of a node selection. Returns false when the
    /// selection is not a node selection.
    pub fn delete_selected_nodes(&mut self) -> EditorResult<bool> {
        let Some(Selection::Node(selection)) = self.selection().cloned() else {
            return Ok(false);
        };
        let keys = selection.get_nodes(self.store())?;
        let Some(first) = keys.first() else {
            return Ok(true);
        };
        let parent = self.parent_key(first)?;
        let index = self.index_of(first)?;
        for key in &keys {
            if self.is_attached(key) {
                self.remove(key)?;
            }
        }

        if !self.is_attached(&parent) {
            self.set_selection(None);
            return Ok(true);
        }
        let siblings = self.children(&parent)?;
        let caret = match (self.node(&parent)?.is_root(), siblings.get(index)) {
            (true, Some(block)) => start_point(self.store(), block),
            _ => prefer_text_point(self.store(), Point::element(parent, index.min(siblings.len()))),
        };
        self.select_caret(caret);
        Ok(true)
    }

    /// Paste the cells of `source_table` into `table`, starting at
    /// `anchor_cell`. The table never grows: cells falling outside it are
    /// dropped. Returns the number of cells written.
    pub fn merge_grid_nodes(
        &mut self,
        table: &NodeKey,
        anchor_cell: &NodeKey,
        source_table: &NodeKey,
    ) -> EditorResult<usize> {
        let source = TableMap::build(self.store(), source_table)?;
        let placements = plan_grid_merge(
            self.store(),
            table,
            anchor_cell,
            source.row_count(),
            source.col_count(),
        )?;

        let mut written = 0;
        for placement in &placements {
            let Some(cell) = source.cell_at(placement.source_row, placement.source_col) else {
                continue;
            };
            if cell.row != placement.source_row || cell.col != placement.source_col {
                continue;
            }
            let content = self.children(&cell.key)?;
            self.clear_children(&placement.target)?;
            self.append(&placement.target, &content)?;
            written += 1;
        }
        if self.is_attached(source_table) {
            self.remove(source_table)?;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grapheme_steps() {
        let text = "ae\u{301}b";
        assert_eq!(next_grapheme(text, 1), 3);
        assert_eq!(previous_grapheme(text, 3), 1);
        assert_eq!(previous_grapheme(text, 0), 0);
    }

    #[test]
    fn test_word_steps() {
        assert_eq!(previous_word("hello world", 11), 6);
        assert_eq!(previous_word("hello world  ", 13), 6);
        assert_eq!(next_word("hello world", 0), 5);
        assert_eq!(next_word("hello world", 5), 11);
        assert_eq!(previous_word("   ", 3), 0);
    }
}
