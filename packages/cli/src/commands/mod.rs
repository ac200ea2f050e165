pub mod check;
pub mod init;
pub mod render;

pub use check::{check, CheckArgs};
pub use init::{init, InitArgs};
pub use render::{render, RenderArgs, RenderFormat};

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use verso_editor::Editor;

/// Editor holding the document stored at `path`
pub(crate) fn open_document(path: &Path, config: &Config) -> Result<Editor> {
    let json = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let mut editor = Editor::new(config.editor.clone());
    let state = editor
        .parse_editor_state(&json)
        .with_context(|| format!("cannot parse {}", path.display()))?;
    editor.set_editor_state(&state)?;
    Ok(editor)
}
