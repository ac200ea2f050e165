use super::open_document;
use crate::config::Config;
use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    Html,
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Serialized document
    pub input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "html")]
    pub format: RenderFormat,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub fn render(args: RenderArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let input = PathBuf::from(cwd).join(&args.input);
    let output = render_document(&input, args.format, &config)?;

    match &args.out {
        Some(out) => {
            let out = PathBuf::from(cwd).join(out);
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out, &output)?;
            info!(input = %input.display(), out = %out.display(), "rendered");
            println!("  {} {} → {}", "✓".green(), args.input.display(), out.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}

/// Document at `input` in the requested format
pub fn render_document(input: &std::path::Path, format: RenderFormat, config: &Config) -> Result<String> {
    let mut editor = open_document(input, config)?;
    Ok(match format {
        RenderFormat::Html => editor.export_html()?,
        RenderFormat::Text => editor.read(|state| state.text_content())?,
        RenderFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(&editor.to_json()?)?;
            serde_json::to_string_pretty(&value)?
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "root": {
            "type": "root",
            "version": 1,
            "children": [
                {
                    "type": "paragraph",
                    "version": 1,
                    "children": [
                        { "type": "text", "version": 1, "text": "Hi", "format": 1 }
                    ]
                }
            ]
        }
    }"#;

    fn write_document() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, DOCUMENT).unwrap();
        (dir, path)
    }

    #[test]
    fn test_render_text() {
        let (_dir, path) = write_document();
        let text = render_document(&path, RenderFormat::Text, &Config::default()).unwrap();
        assert_eq!(text, "Hi");
    }

    #[test]
    fn test_render_html() {
        let (_dir, path) = write_document();
        let html = render_document(&path, RenderFormat::Html, &Config::default()).unwrap();
        assert!(html.contains("<p"));
        assert!(html.contains("<strong"));
        assert!(html.contains("Hi"));
    }
}
