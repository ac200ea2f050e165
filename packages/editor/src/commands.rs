//! # Commands
//!
//! A command is a name plus a payload type. Handlers are registered per
//! command at a priority; dispatch walks priorities from `Critical` down to
//! `Editor` and stops at the first handler that returns `true`.
//!
//! ```text
//! dispatch(INSERT_TEXT, "a")
//!   Critical → High → Normal → Low → Editor
//!                       ↑ first `true` wins
//! ```

use std::fmt;
use std::marker::PhantomData;
use verso_model::{ElementFormat, Selection, TextFormatType};

/// Typed command identifier
pub struct Command<P> {
    name: &'static str,
    _payload: PhantomData<fn(P)>,
}

impl<P> Command<P> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _payload: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<P> Clone for Command<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for Command<P> {}

impl<P> fmt::Debug for Command<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({})", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    /// Built-in behaviour, runs last
    Editor = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

/// The host reports a new selection (`None` clears it)
pub const SELECTION_CHANGE: Command<Option<Selection>> = Command::new("selection_change");
pub const INSERT_TEXT: Command<String> = Command::new("insert_text");
/// Payload: delete backward
pub const DELETE_CHARACTER: Command<bool> = Command::new("delete_character");
pub const DELETE_WORD: Command<bool> = Command::new("delete_word");
pub const DELETE_LINE: Command<bool> = Command::new("delete_line");
pub const REMOVE_TEXT: Command<()> = Command::new("remove_text");
pub const FORMAT_TEXT: Command<TextFormatType> = Command::new("format_text");
pub const FORMAT_ELEMENT: Command<ElementFormat> = Command::new("format_element");
pub const INSERT_PARAGRAPH: Command<()> = Command::new("insert_paragraph");
/// Payload: keep the caret before the break
pub const INSERT_LINE_BREAK: Command<bool> = Command::new("insert_line_break");
pub const INDENT_CONTENT: Command<()> = Command::new("indent_content");
pub const OUTDENT_CONTENT: Command<()> = Command::new("outdent_content");
pub const UNDO: Command<()> = Command::new("undo");
pub const REDO: Command<()> = Command::new("redo");
pub const CLEAR_HISTORY: Command<()> = Command::new("clear_history");
/// Replace the document with a single empty paragraph
pub const CLEAR_EDITOR: Command<()> = Command::new("clear_editor");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities_are_ordered() {
        assert!(CommandPriority::Critical > CommandPriority::High);
        assert!(CommandPriority::Low > CommandPriority::Editor);
    }

    #[test]
    fn test_command_is_copy() {
        let command = INSERT_TEXT;
        let copy = command;
        assert_eq!(command.name(), copy.name());
        assert_eq!(format!("{:?}", UNDO), "Command(undo)");
    }
}
