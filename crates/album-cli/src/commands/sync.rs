//! Sync command implementation
//!
//! Loads the rules file once, then runs reconciliation cycles against the
//! catalog: forever in loop mode, exactly one with `--once`.

use std::path::Path;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use tracing::info;

use album_catalog::{ImmichCatalog, ImmichConfig};
use album_config::load_rules_file;
use album_core::{CycleReport, EngineDefaults, GlobalSharing, SyncEngine, SyncOptions};
use album_store::MembershipStore;

use crate::cli::{CatalogArgs, DeploymentArgs, StoreArgs};
use crate::error::{CliError, Result};

/// Run the sync command
///
/// Fatal errors (unreadable config, unreachable store, expansion failures)
/// abort; per-rule failures are reported and, in `--once` mode, turn into
/// a non-zero exit after the cycle completes.
pub fn run_sync(
    config_path: &Path,
    catalog_args: &CatalogArgs,
    store_args: &StoreArgs,
    deployment: &DeploymentArgs,
    dry_run: bool,
    once: bool,
) -> Result<()> {
    let ruleset = load_rules_file(config_path)?;
    println!(
        "{} Loaded {} rule(s) from {}",
        "=>".blue().bold(),
        ruleset.entries.len(),
        config_path.display()
    );

    let defaults = engine_defaults(deployment)?;
    let catalog = ImmichCatalog::new(ImmichConfig::new(
        catalog_args.base_url.clone(),
        catalog_args.api_key.clone(),
    ))?;
    let mut store = MembershipStore::open(&store_args.db)?;
    let engine = SyncEngine::new(&catalog, defaults);
    let options = SyncOptions { dry_run };

    loop {
        let report = engine.run_cycle(&ruleset, &mut store, &options)?;
        print_report(&report);

        if once {
            if report.has_errors() {
                return Err(CliError::user("sync cycle finished with errors"));
            }
            return Ok(());
        }

        info!(
            seconds = deployment.sleep_interval_seconds,
            "sleeping until next cycle"
        );
        thread::sleep(Duration::from_secs(deployment.sleep_interval_seconds));
    }
}

/// Translate deployment args into engine defaults, rejecting zone names the
/// IANA database does not know.
pub(crate) fn engine_defaults(deployment: &DeploymentArgs) -> Result<EngineDefaults> {
    let timezone = deployment.default_timezone.parse().map_err(|_| {
        CliError::user(format!(
            "invalid DEFAULT_TIMEZONE '{}': not an IANA zone name",
            deployment.default_timezone
        ))
    })?;
    Ok(EngineDefaults {
        timezone,
        allow_fuzzy: deployment.allow_fuzzy_match,
        sharing: GlobalSharing {
            share_all: deployment.share_with_all_users,
            share_users: deployment.share_user_ids.clone(),
        },
    })
}

fn print_report(report: &CycleReport) {
    if report.dry_run {
        println!("{} Dry run: nothing was changed.", "=>".blue().bold());
    }

    for rule in &report.rules {
        match &rule.error {
            Some(error) => {
                println!("   {} {}: {}", "!".red(), rule.rule_id.cyan(), error);
            }
            None => {
                let mut notes = Vec::new();
                if rule.created_album {
                    notes.push("new album".to_string());
                }
                if rule.fuzzy_matches > 0 {
                    notes.push(format!("{} fuzzy", rule.fuzzy_matches));
                }
                if rule.sharing_updated {
                    notes.push("sharing updated".to_string());
                }
                let suffix = if notes.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", notes.join(", "))
                };
                println!(
                    "   {} {} {} +{} -{}{}",
                    "+".green(),
                    rule.rule_id.cyan(),
                    rule.album_name.dimmed(),
                    rule.added,
                    rule.removed,
                    suffix
                );
            }
        }
    }

    if report.stopped_early {
        println!("{} Stopped before finishing all rules.", "=>".blue().bold());
    }

    if report.has_errors() {
        println!(
            "{} Cycle finished with {} failed rule(s); +{} -{} elsewhere.",
            "ERROR".red().bold(),
            report.failed_rules().len(),
            report.assets_added(),
            report.assets_removed()
        );
    } else {
        println!(
            "{} Cycle complete: +{} -{} across {} rule(s).",
            "OK".green().bold(),
            report.assets_added(),
            report.assets_removed(),
            report.rules.len()
        );
    }
}
