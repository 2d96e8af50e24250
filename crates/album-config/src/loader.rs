//! Loading and lowering of rules files.
//!
//! `load_rules_file` is the one entry point the engine and CLI use: read,
//! parse, validate, lower. Lowering turns raw [`RuleConfig`] entries into
//! [`RuleEntry`] values — dates parsed, `MM-DD` split, IANA zones resolved,
//! and legacy `filters` blocks folded into a single `and` condition node.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::conditions::ConditionNode;
use crate::error::{ConfigError, Result};
use crate::model::{
    DateRange, RecurringRuleSpec, Rule, RuleConfig, RuleEntry, RuleSet, RulesFile,
};
use crate::validation::{self, parse_month_day};

/// Load, validate, and lower a rules file from disk.
pub fn load_rules_file(path: &Path) -> Result<RuleSet> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loading rules file");
    load_rules_str(&raw)
}

/// Load, validate, and lower a rules file already read into memory.
pub fn load_rules_str(raw: &str) -> Result<RuleSet> {
    let file: RulesFile = serde_yaml::from_str(raw)?;

    let report = validation::validate(&file);
    if !report.is_empty() {
        return Err(ConfigError::Invalid(report));
    }

    let mut entries = Vec::with_capacity(file.rules.len());
    for rule in file.rules {
        entries.push(lower_rule(rule)?);
    }
    debug!(rules = entries.len(), "rules file loaded");

    Ok(RuleSet {
        mode: file.mode,
        settings: file.settings,
        entries,
    })
}

/// Lower one raw rule. Validation has already run, so failures here mean a
/// caller bypassed [`validation::validate`]; the errors still carry enough
/// context to act on.
fn lower_rule(rule: RuleConfig) -> Result<RuleEntry> {
    let condition = lower_condition(&rule)?;

    if rule.recurring {
        let month_day = rule.month_day.as_deref().unwrap_or_default();
        let (month, day) =
            parse_month_day(month_day).ok_or_else(|| ConfigError::InvalidRecurringRule {
                rule_id: rule.id.clone(),
                reason: format!("'month_day' must be MM-DD, got '{month_day}'"),
            })?;
        let years = match rule.year_range.as_deref() {
            Some([start, end]) if start <= end => (*start, *end),
            other => {
                return Err(ConfigError::InvalidRecurringRule {
                    rule_id: rule.id.clone(),
                    reason: format!("'year_range' must be [start, end], got {other:?}"),
                });
            }
        };
        let album_name_template =
            rule.album_name_template
                .ok_or_else(|| ConfigError::MissingField {
                    rule_id: rule.id.clone(),
                    field: "album_name_template",
                })?;
        let timezone = match rule.timezone.as_deref() {
            None => None,
            Some(zone) => {
                Some(
                    zone.parse::<Tz>()
                        .map_err(|_| ConfigError::InvalidRecurringRule {
                            rule_id: rule.id.clone(),
                            reason: format!("'timezone' is not an IANA zone name: '{zone}'"),
                        })?,
                )
            }
        };

        Ok(RuleEntry::Recurring(RecurringRuleSpec {
            id: rule.id,
            month,
            day,
            duration_days: rule.duration_days.unwrap_or(1),
            years,
            album_name_template,
            description: rule.description,
            timezone,
            condition,
            share_with: rule.share_with,
            fuzzy_match: rule.fuzzy_match,
        }))
    } else {
        let album_name = rule.album_name.ok_or_else(|| ConfigError::MissingField {
            rule_id: rule.id.clone(),
            field: "album_name",
        })?;
        let taken = DateRange::new(
            parse_utc(&rule.id, rule.taken_after.as_deref())?,
            parse_utc(&rule.id, rule.taken_before.as_deref())?,
        );
        let created = DateRange::new(
            parse_utc(&rule.id, rule.created_after.as_deref())?,
            parse_utc(&rule.id, rule.created_before.as_deref())?,
        );

        Ok(RuleEntry::Concrete(Rule {
            id: rule.id,
            album_name,
            description: rule.description,
            taken,
            created,
            condition,
            share_with: rule.share_with,
            fuzzy_match: rule.fuzzy_match,
        }))
    }
}

/// Authored `conditions` pass through; a legacy `filters` block becomes a
/// single `and` node wrapping the one leaf.
fn lower_condition(rule: &RuleConfig) -> Result<Option<ConditionNode>> {
    match (&rule.filters, &rule.conditions) {
        (Some(_), Some(_)) => Err(ConfigError::InvalidCondition {
            rule_id: rule.id.clone(),
            reason: "'filters' and 'conditions' are mutually exclusive".into(),
        }),
        (Some(filters), None) => Ok(Some(ConditionNode::and(vec![ConditionNode::leaf(
            filters.clone(),
        )]))),
        (None, Some(conditions)) => Ok(Some(conditions.clone())),
        (None, None) => Ok(None),
    }
}

fn parse_utc(rule_id: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| ConfigError::InvalidCondition {
                rule_id: rule_id.to_string(),
                reason: format!("bad timestamp '{raw}': {e}"),
            }),
    }
}
