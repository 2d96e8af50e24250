//! Per-rule and per-cycle outcome reports.

use album_store::{RunOutcome, RunStatus};

/// What happened to one rule this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule_id: String,
    pub album_name: String,
    /// `None` when the album does not exist yet and this was a dry run.
    pub album_id: Option<String>,
    pub created_album: bool,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub added: usize,
    pub removed: usize,
    pub sharing_updated: bool,
    pub error: Option<String>,
}

impl RuleReport {
    pub fn failed(rule_id: &str, album_name: &str, error: String) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            album_name: album_name.to_string(),
            album_id: None,
            created_album: false,
            exact_matches: 0,
            fuzzy_matches: 0,
            added: 0,
            removed: 0,
            sharing_updated: false,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// One full pass over the rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub dry_run: bool,
    pub rules: Vec<RuleReport>,
    /// True when the stop flag ended the cycle before every rule ran.
    pub stopped_early: bool,
}

impl CycleReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            rules: Vec::new(),
            stopped_early: false,
        }
    }

    pub fn failed_rules(&self) -> Vec<&RuleReport> {
        self.rules.iter().filter(|rule| rule.is_failed()).collect()
    }

    pub fn has_errors(&self) -> bool {
        self.rules.iter().any(RuleReport::is_failed)
    }

    pub fn assets_added(&self) -> u64 {
        self.rules.iter().map(|rule| rule.added as u64).sum()
    }

    pub fn assets_removed(&self) -> u64 {
        self.rules.iter().map(|rule| rule.removed as u64).sum()
    }

    pub fn status(&self) -> RunStatus {
        if self.has_errors() {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        }
    }

    /// The row to write into the sync-run history.
    pub fn outcome(&self) -> RunOutcome {
        let failed = self.failed_rules();
        let error_message = if failed.is_empty() {
            None
        } else {
            let ids: Vec<&str> = failed.iter().map(|rule| rule.rule_id.as_str()).collect();
            Some(format!("{} rule(s) failed: {}", ids.len(), ids.join(", ")))
        };
        RunOutcome {
            status: self.status(),
            rules_processed: self.rules.len() as u32,
            assets_added: self.assets_added(),
            assets_removed: self.assets_removed(),
            error_message,
        }
    }
}
