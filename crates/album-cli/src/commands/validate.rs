//! Validate command implementation
//!
//! Checks the rules file end to end without touching the catalog: parse,
//! validate, lower, and expand recurring rules so that every problem a sync
//! would hit at startup is reported here first.

use std::path::Path;

use chrono_tz::Tz;
use colored::Colorize;

use album_config::{ConfigError, RuleEntry, load_rules_file};
use album_core::expand_rules;

use crate::error::{CliError, Result};

/// Run the validate command
pub fn run_validate(config_path: &Path, default_timezone: &str) -> Result<()> {
    println!(
        "{} Validating {}...",
        "=>".blue().bold(),
        config_path.display()
    );

    let timezone: Tz = default_timezone.parse().map_err(|_| {
        CliError::user(format!(
            "invalid DEFAULT_TIMEZONE '{default_timezone}': not an IANA zone name"
        ))
    })?;

    let ruleset = match load_rules_file(config_path) {
        Ok(ruleset) => ruleset,
        Err(ConfigError::Invalid(report)) => {
            println!("{} Rules file failed validation:", "ERROR".red().bold());
            for issue in report.issues() {
                println!("   {} {}", "!".red(), issue);
            }
            return Err(CliError::user("validation failed"));
        }
        Err(e) => return Err(e.into()),
    };

    // Expansion is part of validation: window arithmetic over the pinned
    // years only fails once it actually runs.
    let rules = expand_rules(&ruleset.entries, timezone)?;

    let recurring = ruleset
        .entries
        .iter()
        .filter(|entry| matches!(entry, RuleEntry::Recurring(_)))
        .count();
    println!(
        "{} {} rule(s), {} recurring, {} after expansion.",
        "OK".green().bold(),
        ruleset.entries.len(),
        recurring,
        rules.len()
    );

    Ok(())
}
