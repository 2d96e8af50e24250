//! Album Manager CLI
//!
//! The command-line interface for rule-driven album synchronization.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Sync {
            dry_run,
            once,
            catalog,
            store,
            deployment,
        }) => commands::run_sync(&cli.config, &catalog, &store, &deployment, dry_run, once),
        Some(Commands::Validate { default_timezone }) => {
            commands::run_validate(&cli.config, &default_timezone)
        }
        Some(Commands::History { db }) => commands::run_history(&db),
        None => {
            println!("{} Album Manager CLI", "albums".green().bold());
            println!();
            println!("Run {} for available commands.", "albums --help".cyan());
            Ok(())
        }
    }
}

/// Default level is info; `--verbose` lowers it to debug. `RUST_LOG` wins
/// over both when set.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
