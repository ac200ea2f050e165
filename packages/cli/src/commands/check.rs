use super::open_document;
use crate::config::Config;
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Documents or directories to check. Defaults to the configured
    /// documents directory.
    pub paths: Vec<PathBuf>,
}

pub fn check(args: CheckArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let roots = if args.paths.is_empty() {
        vec![config.get_docs_dir(cwd)]
    } else {
        args.paths.iter().map(|path| PathBuf::from(cwd).join(path)).collect()
    };

    let documents = find_documents(&roots);
    if documents.is_empty() {
        println!("{} No documents found", "!".yellow());
        return Ok(());
    }

    println!("{} {} document(s)", "Checking".bright_blue().bold(), documents.len());
    let mut failures = 0;
    for document in &documents {
        match check_document(document, &config) {
            Ok(nodes) => {
                debug!(path = %document.display(), nodes, "valid");
                println!("  {} {}", "✓".green(), document.display());
            }
            Err(err) => {
                failures += 1;
                println!("  {} {}: {:#}", "✗".red(), document.display(), err);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} documents are invalid", failures, documents.len());
    }
    println!();
    println!("{}", "All documents valid".green().bold());
    Ok(())
}

/// Load and validate one document. Returns its node count.
pub fn check_document(path: &Path, config: &Config) -> Result<usize> {
    let editor = open_document(path, config)?;
    let state = editor.state();
    state.validate()?;
    Ok(state.store().len())
}

/// `.json` files under the given files and directories
fn find_documents(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut documents = Vec::new();
    for root in roots {
        if root.is_file() {
            documents.push(root.clone());
            continue;
        }
        for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                documents.push(path.to_path_buf());
            }
        }
    }
    documents
}
