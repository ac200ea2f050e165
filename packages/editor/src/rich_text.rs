//! # Rich Text
//!
//! Default handlers for the editing commands, registered at
//! [`CommandPriority::Editor`] so any other handler can take precedence.
//! On a read-only editor every handler declines the command.

use crate::commands::*;
use crate::editor::Editor;
use crate::errors::{EditorError, EditorResult};
use crate::listeners::Unregister;
use crate::transaction::Transaction;

/// Run `f` when the editor is editable and has a range selection
fn with_range(tx: &mut Transaction<'_>, f: impl FnOnce(&mut Transaction<'_>) -> EditorResult<()>) -> EditorResult<bool> {
    if !tx.is_editable() || tx.range_selection().is_none() {
        return Ok(false);
    }
    f(tx)?;
    Ok(true)
}

/// Deletion commands also remove a node selection
fn delete_with(
    tx: &mut Transaction<'_>,
    f: impl FnOnce(&mut Transaction<'_>) -> EditorResult<()>,
) -> EditorResult<bool> {
    if !tx.is_editable() {
        return Ok(false);
    }
    if tx.delete_selected_nodes()? {
        return Ok(true);
    }
    with_range(tx, f)
}

pub fn register_rich_text(editor: &Editor) -> Unregister {
    let priority = CommandPriority::Editor;
    let handles = vec![
        editor.register_command(SELECTION_CHANGE, priority, |selection, tx| {
            if let Some(selection) = selection {
                selection
                    .validate(tx.store())
                    .map_err(|e| EditorError::InvalidSelection(e.to_string()))?;
            }
            tx.set_selection(selection.clone());
            Ok(true)
        }),
        editor.register_command(INSERT_TEXT, priority, |text, tx| {
            with_range(tx, |tx| tx.insert_text(text))
        }),
        editor.register_command(DELETE_CHARACTER, priority, |backward, tx| {
            delete_with(tx, |tx| tx.delete_character(*backward))
        }),
        editor.register_command(DELETE_WORD, priority, |backward, tx| {
            delete_with(tx, |tx| tx.delete_word(*backward))
        }),
        editor.register_command(DELETE_LINE, priority, |backward, tx| {
            delete_with(tx, |tx| tx.delete_line(*backward))
        }),
        editor.register_command(REMOVE_TEXT, priority, |_, tx| {
            delete_with(tx, |tx| tx.remove_text())
        }),
        editor.register_command(FORMAT_TEXT, priority, |format, tx| {
            with_range(tx, |tx| tx.format_text(*format))
        }),
        editor.register_command(FORMAT_ELEMENT, priority, |format, tx| {
            if !tx.is_editable() || tx.selection().is_none() {
                return Ok(false);
            }
            tx.format_element(*format)?;
            Ok(true)
        }),
        editor.register_command(INSERT_PARAGRAPH, priority, |_, tx| {
            with_range(tx, |tx| tx.insert_paragraph().map(|_| ()))
        }),
        editor.register_command(INSERT_LINE_BREAK, priority, |select_start, tx| {
            with_range(tx, |tx| tx.insert_line_break(*select_start))
        }),
        editor.register_command(INDENT_CONTENT, priority, |_, tx| {
            if !tx.is_editable() || tx.selection().is_none() {
                return Ok(false);
            }
            tx.indent()?;
            Ok(true)
        }),
        editor.register_command(OUTDENT_CONTENT, priority, |_, tx| {
            if !tx.is_editable() || tx.selection().is_none() {
                return Ok(false);
            }
            tx.outdent()?;
            Ok(true)
        }),
        editor.register_command(CLEAR_EDITOR, priority, |_, tx| {
            if !tx.is_editable() {
                return Ok(false);
            }
            tx.clear()?;
            Ok(true)
        }),
    ];
    Unregister::merge(handles)
}

