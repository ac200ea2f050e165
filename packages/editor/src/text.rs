//! Text node operations. Offsets count characters (Unicode scalar values).

use crate::errors::{EditorError, EditorResult};
use crate::transaction::Transaction;
use verso_model::traversal;
use verso_model::{NodeKey, NodeKind, Point, TextData, TextFormat, TextFormatType, TextMode};

/// Byte index of a character offset, clamped to the end
pub(crate) fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices().nth(offset).map(|(i, _)| i).unwrap_or(text.len())
}

impl Transaction<'_> {
    /// Replace the text. Points past the new end are clamped.
    pub fn set_text(&mut self, key: &NodeKey, text: impl Into<String>) -> EditorResult<()> {
        let text = text.into();
        let len = text.chars().count();
        self.writable_text(key)?.text = text;
        self.update_points(|point| {
            if point.is_text() && &point.key == key {
                point.offset = point.offset.min(len);
            }
        });
        Ok(())
    }

    /// Delete `delete_count` characters at `offset` and insert `insert`
    /// there. With `move_selection` the caret lands after the insertion;
    /// otherwise points on the node are shifted.
    pub fn splice_text(
        &mut self,
        key: &NodeKey,
        offset: usize,
        delete_count: usize,
        insert: &str,
        move_selection: bool,
    ) -> EditorResult<()> {
        let data = self.text(key)?;
        let len = data.len();
        let offset = offset.min(len);
        let delete_count = delete_count.min(len - offset);
        let start = byte_index(&data.text, offset);
        let end = byte_index(&data.text, offset + delete_count);
        let inserted = insert.chars().count();

        self.writable_text(key)?.text.replace_range(start..end, insert);

        if move_selection {
            self.move_caret(Point::text(key.clone(), offset + inserted));
        } else {
            self.update_points(|point| {
                if !point.is_text() || &point.key != key {
                    return;
                }
                if point.offset >= offset + delete_count {
                    point.offset = point.offset + inserted - delete_count;
                } else if point.offset > offset {
                    point.offset = offset;
                }
            });
        }
        Ok(())
    }

    /// Split a text node at the given offsets. The node keeps the first
    /// fragment; new siblings carry the rest with the same format. Points
    /// at a split offset stay on the left fragment.
    pub fn split_text(&mut self, key: &NodeKey, offsets: &[usize]) -> EditorResult<Vec<NodeKey>> {
        let data = self.text(key)?.clone();
        let len = data.len();
        let mut cuts: Vec<usize> = offsets.iter().copied().filter(|o| *o > 0 && *o < len).collect();
        cuts.sort_unstable();
        cuts.dedup();
        if cuts.is_empty() {
            return Ok(vec![key.clone()]);
        }
        self.parent_key(key)?;

        let chars: Vec<char> = data.text.chars().collect();
        let mut bounds = Vec::with_capacity(cuts.len() + 2);
        bounds.push(0);
        bounds.extend(cuts.iter().copied());
        bounds.push(len);
        let pieces: Vec<String> = bounds
            .windows(2)
            .map(|w| chars[w[0]..w[1]].iter().collect())
            .collect();

        self.writable_text(key)?.text = pieces[0].clone();
        let mut fragments = vec![key.clone()];
        for piece in &pieces[1..] {
            let fragment = self.create_text_with(TextData {
                text: piece.clone(),
                ..data.clone()
            });
            let previous = fragments[fragments.len() - 1].clone();
            self.insert_after(&previous, &fragment)?;
            fragments.push(fragment);
        }

        self.update_points(|point| {
            if !point.is_text() || &point.key != key {
                return;
            }
            let index = cuts.iter().filter(|cut| point.offset > **cut).count();
            point.key = fragments[index].clone();
            point.offset -= bounds[index];
        });
        Ok(fragments)
    }

    /// Merge an adjacent text sibling into `key`. The target is removed and
    /// points on it move into `key`.
    pub fn merge_with_sibling(&mut self, key: &NodeKey, target: &NodeKey) -> EditorResult<NodeKey> {
        let store = self.store();
        let is_before = traversal::previous_sibling(store, key) == Some(target);
        let is_after = traversal::next_sibling(store, key) == Some(target);
        if !is_before && !is_after {
            return Err(EditorError::structure(format!(
                "{target} is not an adjacent sibling of {key}"
            )));
        }
        let own = self.text(key)?.text.clone();
        let other = self.text(target)?.text.clone();
        let own_len = own.chars().count();
        let other_len = other.chars().count();

        self.update_points(|point| {
            if !point.is_text() {
                return;
            }
            if &point.key == target {
                point.key = key.clone();
                if is_after {
                    point.offset += own_len;
                }
            } else if &point.key == key && is_before {
                point.offset += other_len;
            }
        });
        self.writable_text(key)?.text = if is_before { other + &own } else { own + &other };
        self.detach(target, true)?;
        Ok(key.clone())
    }

    pub fn toggle_text_format(&mut self, key: &NodeKey, ty: TextFormatType) -> EditorResult<()> {
        let text = self.writable_text(key)?;
        text.format = text.format.toggled(ty);
        Ok(())
    }

    pub fn set_text_format(&mut self, key: &NodeKey, format: TextFormat) -> EditorResult<()> {
        self.writable_text(key)?.format = format;
        Ok(())
    }

    pub fn set_text_style(&mut self, key: &NodeKey, style: impl Into<String>) -> EditorResult<()> {
        self.writable_text(key)?.style = style.into();
        Ok(())
    }

    pub fn set_text_mode(&mut self, key: &NodeKey, mode: TextMode) -> EditorResult<()> {
        self.writable_text(key)?.mode = mode;
        Ok(())
    }

    /// Text length of a node, zero for anything else
    pub(crate) fn text_len(&self, key: &NodeKey) -> usize {
        match self.get(key).map(|node| &node.kind) {
            Some(NodeKind::Text(data)) => data.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::Fixture;

    /// root ─ p ─ t "Hello world"
    fn hello(fixture: &mut Fixture) -> (NodeKey, NodeKey) {
        let mut tx = fixture.tx();
        let paragraph = tx.create_paragraph();
        let text = tx.create_text("Hello world");
        tx.append(&NodeKey::root(), &[paragraph.clone()]).unwrap();
        tx.append(&paragraph, &[text.clone()]).unwrap();
        (paragraph, text)
    }

    #[test]
    fn test_split_and_merge_round_trip() {
        let mut fixture = Fixture::new();
        let (paragraph, text) = hello(&mut fixture);
        let mut tx = fixture.tx();

        let fragments = tx.split_text(&text, &[5]).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], text);
        assert_eq!(tx.text(&fragments[0]).unwrap().text, "Hello");
        assert_eq!(tx.text(&fragments[1]).unwrap().text, " world");
        assert_eq!(tx.children(&paragraph).unwrap(), fragments);

        tx.merge_with_sibling(&text, &fragments[1]).unwrap();
        assert_eq!(tx.text(&text).unwrap().text, "Hello world");
        assert_eq!(tx.children(&paragraph).unwrap(), vec![text]);
    }

    #[test]
    fn test_split_moves_points_past_the_cut() {
        let mut fixture = Fixture::new();
        let (_, text) = hello(&mut fixture);
        let mut tx = fixture.tx();
        tx.select_caret(Point::text(text.clone(), 8));

        let fragments = tx.split_text(&text, &[5]).unwrap();
        assert_eq!(tx.range_selection().unwrap().anchor, Point::text(fragments[1].clone(), 3));
    }

    #[test]
    fn test_split_keeps_points_before_the_cut() {
        let mut fixture = Fixture::new();
        let (_, text) = hello(&mut fixture);
        let mut tx = fixture.tx();
        tx.select_caret(Point::text(text.clone(), 8));

        tx.split_text(&text, &[9]).unwrap();
        assert_eq!(tx.range_selection().unwrap().anchor, Point::text(text, 8));
    }

    #[test]
    fn test_point_at_cut_stays_left() {
        let mut fixture = Fixture::new();
        let (_, text) = hello(&mut fixture);
        let mut tx = fixture.tx();
        tx.select_caret(Point::text(text.clone(), 5));
        tx.split_text(&text, &[5]).unwrap();
        assert_eq!(tx.range_selection().unwrap().anchor, Point::text(text, 5));
    }

    #[test]
    fn test_splice_counts_characters() {
        let mut fixture = Fixture::new();
        let (_, text) = hello(&mut fixture);
        let mut tx = fixture.tx();
        tx.set_text(&text, "héllo").unwrap();
        tx.splice_text(&text, 2, 1, "L", true).unwrap();
        assert_eq!(tx.text(&text).unwrap().text, "héLlo");
        assert_eq!(tx.range_selection().unwrap().anchor, Point::text(text, 3));
    }

    #[test]
    fn test_splice_shifts_points_after_the_edit() {
        let mut fixture = Fixture::new();
        let (_, text) = hello(&mut fixture);
        let mut tx = fixture.tx();
        tx.select(Point::text(text.clone(), 2), Point::text(text.clone(), 9));
        tx.splice_text(&text, 0, 5, "Hi", false).unwrap();
        let range = tx.range_selection().unwrap();
        assert_eq!(range.anchor.offset, 0);
        assert_eq!(range.focus.offset, 6);
    }

    #[test]
    fn test_set_text_clamps_points() {
        let mut fixture = Fixture::new();
        let (_, text) = hello(&mut fixture);
        let mut tx = fixture.tx();
        tx.select_caret(Point::text(text.clone(), 11));
        tx.set_text(&text, "Hi").unwrap();
        assert_eq!(tx.range_selection().unwrap().anchor.offset, 2);
    }

    #[test]
    fn test_merge_requires_adjacent_sibling() {
        let mut fixture = Fixture::new();
        let (_, text) = hello(&mut fixture);
        let mut tx = fixture.tx();
        let loose = tx.create_text("x");
        assert!(tx.merge_with_sibling(&text, &loose).is_err());
    }

    #[test]
    fn test_format_toggles() {
        let mut fixture = Fixture::new();
        let (_, text) = hello(&mut fixture);
        let mut tx = fixture.tx();
        tx.toggle_text_format(&text, TextFormatType::Bold).unwrap();
        assert!(tx.text(&text).unwrap().format.has(TextFormatType::Bold));
        tx.toggle_text_format(&text, TextFormatType::Bold).unwrap();
        assert!(tx.text(&text).unwrap().format.is_empty());
    }
}
