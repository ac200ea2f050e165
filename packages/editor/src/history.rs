//! # History
//!
//! Undo/redo over committed editor states.
//!
//! ## Design
//!
//! - Every commit that changes content pushes the state it replaced
//! - Runs of single-character typing (or deleting) within the merge delay
//!   collapse into one undo step
//! - Selection-only commits never create a step
//! - Undo and redo swap a stored state back in, tagged `historic` so the
//!   commit is not recorded again
//! - A new step clears the redo stack
//!
//! Update tags steer recording: `history-merge` folds the commit into the
//! current step, `history-push` always starts a new one.

use crate::commands::{CommandPriority, CLEAR_HISTORY, REDO, UNDO};
use crate::config::HistoryConfig;
use crate::editor::Editor;
use crate::listeners::{UpdatePayload, Unregister};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use verso_model::EditorState;

pub const HISTORIC_TAG: &str = "historic";
pub const HISTORY_MERGE_TAG: &str = "history-merge";
pub const HISTORY_PUSH_TAG: &str = "history-push";

/// What a commit did, for merging consecutive steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    InsertCharacter,
    DeleteCharacter,
    Other,
}

/// Classify a commit by its dirty sets and the text delta of its only
/// dirty leaf
pub fn classify_change(payload: &UpdatePayload) -> ChangeKind {
    if payload.dirty_leaves.len() != 1 || payload.dirty_elements.values().any(|intentional| *intentional) {
        return ChangeKind::Other;
    }
    let Some(key) = payload.dirty_leaves.iter().next() else {
        return ChangeKind::Other;
    };
    let (Some(prev), Some(next)) = (
        payload.prev_state.node(key).and_then(|n| n.text_data()),
        payload.state.node(key).and_then(|n| n.text_data()),
    ) else {
        return ChangeKind::Other;
    };
    match next.len() as i64 - prev.len() as i64 {
        1 => ChangeKind::InsertCharacter,
        -1 => ChangeKind::DeleteCharacter,
        _ => ChangeKind::Other,
    }
}

#[derive(Debug)]
pub struct HistoryState {
    undo_stack: Vec<Arc<EditorState>>,
    redo_stack: Vec<Arc<EditorState>>,
    current: Arc<EditorState>,
    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
    merge_delay: Duration,
    last_change: Option<(Instant, ChangeKind)>,
}

impl HistoryState {
    pub fn new(current: Arc<EditorState>, config: &HistoryConfig) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            current,
            max_levels: config.max_levels,
            merge_delay: Duration::from_millis(config.merge_delay_ms),
            last_change: None,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn current(&self) -> &Arc<EditorState> {
        &self.current
    }

    /// Record a commit observed at `now`
    pub fn record(&mut self, payload: &UpdatePayload, now: Instant) {
        if payload.has_tag(HISTORIC_TAG) {
            return;
        }
        if payload.is_selection_only() {
            self.current = Arc::clone(&payload.state);
            return;
        }

        let change = classify_change(payload);
        let merge = if payload.has_tag(HISTORY_MERGE_TAG) {
            true
        } else if payload.has_tag(HISTORY_PUSH_TAG) || change == ChangeKind::Other {
            false
        } else {
            matches!(
                self.last_change,
                Some((at, kind)) if kind == change && now.duration_since(at) < self.merge_delay
            )
        };

        if !merge {
            let previous = std::mem::replace(&mut self.current, Arc::clone(&payload.state));
            self.push_undo(previous);
        } else {
            self.current = Arc::clone(&payload.state);
        }
        self.last_change = Some((now, change));
    }

    fn push_undo(&mut self, state: Arc<EditorState>) {
        self.undo_stack.push(state);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        self.redo_stack.clear();
    }

    /// State to restore for an undo, moving the current one onto the redo
    /// stack
    pub fn undo(&mut self) -> Option<Arc<EditorState>> {
        let state = self.undo_stack.pop()?;
        let current = std::mem::replace(&mut self.current, Arc::clone(&state));
        self.redo_stack.push(current);
        self.last_change = None;
        Some(state)
    }

    pub fn redo(&mut self) -> Option<Arc<EditorState>> {
        let state = self.redo_stack.pop()?;
        let current = std::mem::replace(&mut self.current, Arc::clone(&state));
        self.undo_stack.push(current);
        self.last_change = None;
        Some(state)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_change = None;
    }
}

type ChangeFn = dyn Fn(bool, bool);

/// Shared history plus the listeners told when undo/redo availability
/// changes
#[derive(Clone)]
pub struct HistoryHandle {
    state: Rc<RefCell<HistoryState>>,
    listeners: Rc<RefCell<Vec<Rc<ChangeFn>>>>,
}

impl HistoryHandle {
    pub fn can_undo(&self) -> bool {
        self.state.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.borrow().can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.state.borrow().undo_depth()
    }

    /// Called with `(can_undo, can_redo)` whenever either changes
    pub fn on_change(&self, listener: impl Fn(bool, bool) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut HistoryState) -> R) -> R {
        let before = self.availability();
        let result = f(&mut self.state.borrow_mut());
        let after = self.availability();
        if before != after {
            let listeners: Vec<Rc<ChangeFn>> = self.listeners.borrow().iter().cloned().collect();
            for listener in listeners {
                listener(after.0, after.1);
            }
        }
        result
    }

    fn availability(&self) -> (bool, bool) {
        let state = self.state.borrow();
        (state.can_undo(), state.can_redo())
    }
}

/// Attach undo/redo to an editor. Returns the history handle and the
/// handle removing every listener and command handler it registered.
pub fn register_history(editor: &Editor, config: &HistoryConfig) -> (HistoryHandle, Unregister) {
    let handle = HistoryHandle {
        state: Rc::new(RefCell::new(HistoryState::new(editor.state(), config))),
        listeners: Rc::new(RefCell::new(Vec::new())),
    };

    let recorder = handle.clone();
    let updates = editor.register_update_listener(move |payload| {
        recorder.with_state(|history| history.record(payload, Instant::now()));
    });

    let undo = handle.clone();
    let undo_command = editor.register_command(UNDO, CommandPriority::Editor, move |_, tx| {
        let Some(state) = undo.with_state(HistoryState::undo) else {
            return Ok(false);
        };
        debug!("undo");
        tx.set_editor_state(&state);
        tx.add_tag(HISTORIC_TAG);
        Ok(true)
    });

    let redo = handle.clone();
    let redo_command = editor.register_command(REDO, CommandPriority::Editor, move |_, tx| {
        let Some(state) = redo.with_state(HistoryState::redo) else {
            return Ok(false);
        };
        debug!("redo");
        tx.set_editor_state(&state);
        tx.add_tag(HISTORIC_TAG);
        Ok(true)
    });

    let clear = handle.clone();
    let clear_command = editor.register_command(CLEAR_HISTORY, CommandPriority::Editor, move |_, _| {
        clear.with_state(HistoryState::clear);
        Ok(true)
    });

    let unregister = Unregister::merge([updates, undo_command, redo_command, clear_command]);
    (handle, unregister)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap, HashSet};
    use verso_model::{Node, NodeKey, NodeStore};

    fn state_with_text(text: &str) -> Arc<EditorState> {
        let mut store = NodeStore::new();
        let key = NodeKey::from("t");
        let paragraph = NodeKey::from("p");
        let mut p = Node::paragraph(paragraph.clone());
        p.parent = Some(NodeKey::root());
        if let Some(data) = p.element_mut() {
            data.children.push(key.clone());
        }
        let mut t = Node::text(key, text);
        t.parent = Some(paragraph.clone());
        if let Some(data) = store.get_mut(&NodeKey::root()).and_then(|n| n.element_mut()) {
            data.children.push(paragraph);
        }
        store.insert(p);
        store.insert(t);
        Arc::new(EditorState::new(store, None))
    }

    fn payload(prev: &Arc<EditorState>, next: &Arc<EditorState>, tags: &[&str]) -> UpdatePayload {
        UpdatePayload {
            prev_state: Arc::clone(prev),
            state: Arc::clone(next),
            dirty_leaves: HashSet::from([NodeKey::from("t")]),
            dirty_elements: HashMap::from([(NodeKey::from("p"), false), (NodeKey::root(), false)]),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn history(initial: &Arc<EditorState>) -> HistoryState {
        HistoryState::new(
            Arc::clone(initial),
            &HistoryConfig {
                max_levels: 2,
                merge_delay_ms: 1000,
            },
        )
    }

    #[test]
    fn test_typing_merges_within_delay() {
        let states: Vec<_> = ["", "a", "ab", "abc"].iter().map(|t| state_with_text(t)).collect();
        let mut history = history(&states[0]);
        let start = Instant::now();
        history.record(&payload(&states[0], &states[1], &[]), start);
        history.record(&payload(&states[1], &states[2], &[]), start + Duration::from_millis(100));
        history.record(&payload(&states[2], &states[3], &[]), start + Duration::from_millis(5000));
        assert_eq!(history.undo_depth(), 2);

        let restored = history.undo().unwrap();
        assert_eq!(restored.text_content(), "ab");
        assert!(history.can_redo());
        assert_eq!(history.undo().unwrap().text_content(), "");
        assert!(history.undo().is_none());
        assert_eq!(history.redo().unwrap().text_content(), "ab");
    }

    #[test]
    fn test_push_tag_and_max_levels() {
        let states: Vec<_> = ["", "a", "ab", "abc"].iter().map(|t| state_with_text(t)).collect();
        let mut history = history(&states[0]);
        let now = Instant::now();
        for window in states.windows(2) {
            history.record(&payload(&window[0], &window[1], &[HISTORY_PUSH_TAG]), now);
        }
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo().unwrap().text_content(), "ab");
    }

    #[test]
    fn test_historic_and_selection_only_commits_are_not_steps() {
        let states: Vec<_> = ["", "a"].iter().map(|t| state_with_text(t)).collect();
        let mut history = history(&states[0]);
        history.record(&payload(&states[0], &states[1], &[HISTORIC_TAG]), Instant::now());
        assert!(!history.can_undo());

        let mut selection_only = payload(&states[0], &states[1], &[]);
        selection_only.dirty_leaves.clear();
        selection_only.dirty_elements.clear();
        history.record(&selection_only, Instant::now());
        assert!(!history.can_undo());
        assert_eq!(history.current().text_content(), "a");
    }

    #[test]
    fn test_classify_change() {
        let a = state_with_text("a");
        let ab = state_with_text("ab");
        let abcd = state_with_text("abcd");
        assert_eq!(classify_change(&payload(&a, &ab, &[])), ChangeKind::InsertCharacter);
        assert_eq!(classify_change(&payload(&ab, &a, &[])), ChangeKind::DeleteCharacter);
        assert_eq!(classify_change(&payload(&ab, &abcd, &[])), ChangeKind::Other);
    }
}
