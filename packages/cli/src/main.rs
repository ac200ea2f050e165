mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, init, render, CheckArgs, InitArgs, RenderArgs};
use tracing_subscriber::EnvFilter;

/// Verso CLI - render and validate rich text documents
#[derive(Parser, Debug)]
#[command(name = "verso")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log editor activity (overridden by VERSO_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new Verso project
    Init(InitArgs),

    /// Render a document as HTML, plain text or JSON
    Render(RenderArgs),

    /// Validate serialized documents
    Check(CheckArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "verso_editor=debug,verso_reconciler=debug,verso_model=debug,info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("VERSO_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.display().to_string(),
        Err(err) => {
            eprintln!("{} cannot get current directory: {}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Render(args) => render(args, &cwd),
        Command::Check(args) => check(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
