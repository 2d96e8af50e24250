//! History command implementation

use std::path::Path;

use colored::Colorize;

use album_store::{MembershipStore, RunStatus, SyncRunRecord};

use crate::error::Result;

/// Run the history command
///
/// Prints the most recent sync run from the membership database.
pub fn run_history(db: &Path) -> Result<()> {
    let store = MembershipStore::open(db)?;
    match store.last_sync_run()? {
        None => println!("No sync runs recorded."),
        Some(run) => print_run(&run),
    }
    Ok(())
}

fn print_run(run: &SyncRunRecord) {
    let status = match run.status {
        RunStatus::Running => "RUNNING".blue().bold(),
        RunStatus::Completed => "OK".green().bold(),
        RunStatus::CompletedWithErrors => "ERRORS".yellow().bold(),
        RunStatus::Failed => "FAILED".red().bold(),
    };

    println!("{} Run #{} started {}", status, run.id, run.started_at.to_rfc3339());
    match run.completed_at {
        Some(completed) => {
            let seconds = (completed - run.started_at).num_seconds();
            println!("   finished {} ({}s)", completed.to_rfc3339(), seconds);
        }
        None => println!("   still running (or interrupted)"),
    }
    println!(
        "   {} rule(s), +{} -{} assets",
        run.rules_processed, run.assets_added, run.assets_removed
    );
    if let Some(message) = &run.error_message {
        println!("   {} {}", "!".red(), message);
    }
}
