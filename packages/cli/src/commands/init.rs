use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use verso_editor::{Editor, ElementKind, NodeKey, TextFormatType, UpdateOptions};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Documents directory
    #[arg(short, long, default_value = "docs")]
    pub docs_dir: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!("{} {} already exists", "!".yellow(), DEFAULT_CONFIG_NAME.bright_white());
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "Initializing Verso project...".bright_blue().bold());

    let config = Config {
        docs_dir: args.docs_dir.clone(),
        ..Config::default()
    };

    let docs_dir = config.get_docs_dir(cwd);
    if !docs_dir.exists() {
        fs::create_dir_all(&docs_dir)?;
        println!("  {} Created {}/", "✓".green(), args.docs_dir);
    }

    let welcome = docs_dir.join("welcome.json");
    if !welcome.exists() {
        fs::write(&welcome, welcome_document(&config)?)?;
        println!("  {} Created welcome.json", "✓".green());
    }

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Run: verso render {}/welcome.json", args.docs_dir);
    println!("  2. Run: verso check");

    Ok(())
}

/// Serialized starter document
fn welcome_document(config: &Config) -> Result<String> {
    let mut editor = Editor::new(config.editor.clone());
    editor.update_with(UpdateOptions::discrete(), |tx| {
        let heading = tx.create_element(ElementKind::Heading { level: 1 });
        let title = tx.create_text("Welcome to Verso");
        tx.append(&NodeKey::root(), &[heading.clone()])?;
        tx.append(&heading, &[title])?;

        let paragraph = tx.create_paragraph();
        let lead = tx.create_text("Documents are ");
        let strong = tx.create_text("plain JSON");
        tx.toggle_text_format(&strong, TextFormatType::Bold)?;
        let tail = tx.create_text(" and render to HTML.");
        tx.append(&NodeKey::root(), &[paragraph.clone()])?;
        tx.append(&paragraph, &[lead, strong, tail])
    })?;
    Ok(editor.to_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_config_and_document() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        init(
            InitArgs {
                docs_dir: "notes".to_string(),
                force: false,
            },
            &cwd,
        )
        .unwrap();

        let config = Config::load(&cwd).unwrap();
        assert_eq!(config.docs_dir, "notes");
        let document = dir.path().join("notes").join("welcome.json");
        let editor = crate::commands::open_document(&document, &config).unwrap();
        assert!(editor.state().text_content().starts_with("Welcome to Verso"));
    }
}
