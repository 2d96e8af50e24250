//! Rules-file validation.
//!
//! Runs against the raw [`RulesFile`] before lowering and aggregates every
//! finding into one [`ValidationReport`], so a broken file reports all of
//! its problems in a single pass instead of failing on the first.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

use crate::conditions::ConditionNode;
use crate::model::{RuleConfig, RulesFile, ShareWith};

/// A single validation finding, attributed to a rule where possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub rule_id: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn file(message: impl Into<String>) -> Self {
        Self {
            rule_id: None,
            message: message.into(),
        }
    }

    fn rule(id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule_id {
            Some(id) => write!(f, "rule '{id}': {}", self.message),
            None => write!(f, "rules file: {}", self.message),
        }
    }
}

/// All findings from one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {issue}")?;
        }
        Ok(())
    }
}

/// Validate a parsed rules file. An empty report means the file is sound
/// and lowering cannot fail.
pub fn validate(file: &RulesFile) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut seen_ids = HashSet::new();
    for rule in &file.rules {
        if rule.id.trim().is_empty() {
            report.push(ValidationIssue::file("rule with empty id"));
        } else if !seen_ids.insert(rule.id.as_str()) {
            report.push(ValidationIssue::file(format!(
                "duplicate rule id '{}'",
                rule.id
            )));
        }
        validate_rule(rule, &mut report);
    }

    report
}

fn validate_rule(rule: &RuleConfig, report: &mut ValidationReport) {
    if rule.recurring {
        validate_recurring_fields(rule, report);
        for field in [
            ("album_name", rule.album_name.is_some()),
            ("taken_after", rule.taken_after.is_some()),
            ("taken_before", rule.taken_before.is_some()),
            ("created_after", rule.created_after.is_some()),
            ("created_before", rule.created_before.is_some()),
        ] {
            if field.1 {
                report.push(ValidationIssue::rule(
                    &rule.id,
                    format!("'{}' is not valid on a recurring rule", field.0),
                ));
            }
        }
    } else {
        validate_concrete_fields(rule, report);
        for field in [
            ("month_day", rule.month_day.is_some()),
            ("duration_days", rule.duration_days.is_some()),
            ("year_range", rule.year_range.is_some()),
            ("album_name_template", rule.album_name_template.is_some()),
            ("timezone", rule.timezone.is_some()),
        ] {
            if field.1 {
                report.push(ValidationIssue::rule(
                    &rule.id,
                    format!("'{}' is only valid on a recurring rule", field.0),
                ));
            }
        }
    }

    if rule.filters.is_some() && rule.conditions.is_some() {
        report.push(ValidationIssue::rule(
            &rule.id,
            "'filters' and 'conditions' are mutually exclusive",
        ));
    }
    if let Some(filters) = &rule.filters
        && filters.is_empty()
    {
        report.push(ValidationIssue::rule(&rule.id, "'filters' block is empty"));
    }
    if let Some(conditions) = &rule.conditions {
        validate_condition(&rule.id, conditions, report);
    }
    if let Some(ShareWith::Users(users)) = &rule.share_with
        && users.iter().any(|email| email.trim().is_empty())
    {
        report.push(ValidationIssue::rule(
            &rule.id,
            "share_with contains an empty email",
        ));
    }
}

fn validate_concrete_fields(rule: &RuleConfig, report: &mut ValidationReport) {
    match &rule.album_name {
        None => report.push(ValidationIssue::rule(&rule.id, "missing 'album_name'")),
        Some(name) if name.trim().is_empty() => {
            report.push(ValidationIssue::rule(&rule.id, "'album_name' is empty"));
        }
        Some(_) => {}
    }

    for (field, value) in [
        ("taken_after", &rule.taken_after),
        ("taken_before", &rule.taken_before),
        ("created_after", &rule.created_after),
        ("created_before", &rule.created_before),
    ] {
        if let Some(value) = value
            && DateTime::parse_from_rfc3339(value).is_err()
        {
            report.push(ValidationIssue::rule(
                &rule.id,
                format!("'{field}' is not an RFC 3339 timestamp: '{value}'"),
            ));
        }
    }
}

fn validate_recurring_fields(rule: &RuleConfig, report: &mut ValidationReport) {
    match &rule.month_day {
        None => report.push(ValidationIssue::rule(&rule.id, "missing 'month_day'")),
        Some(raw) => {
            if let Some((month, day)) = parse_month_day(raw) {
                // 2020 is a leap year, so 02-29 passes and only dates that
                // exist in no year at all are rejected here.
                if NaiveDate::from_ymd_opt(2020, month, day).is_none() {
                    report.push(ValidationIssue::rule(
                        &rule.id,
                        format!("'month_day' {raw} is not a real calendar date"),
                    ));
                }
            } else {
                report.push(ValidationIssue::rule(
                    &rule.id,
                    format!("'month_day' must be MM-DD, got '{raw}'"),
                ));
            }
        }
    }

    match &rule.year_range {
        None => report.push(ValidationIssue::rule(&rule.id, "missing 'year_range'")),
        Some(range) => {
            if range.len() != 2 {
                report.push(ValidationIssue::rule(
                    &rule.id,
                    "'year_range' must be [start, end]",
                ));
            } else if range[0] > range[1] {
                report.push(ValidationIssue::rule(
                    &rule.id,
                    format!("'year_range' start {} is after end {}", range[0], range[1]),
                ));
            }
        }
    }

    match &rule.album_name_template {
        None => report.push(ValidationIssue::rule(
            &rule.id,
            "missing 'album_name_template'",
        )),
        Some(template) if !template.contains("{year}") => {
            report.push(ValidationIssue::rule(
                &rule.id,
                "'album_name_template' must contain '{year}'",
            ));
        }
        Some(_) => {}
    }

    if rule.duration_days == Some(0) {
        report.push(ValidationIssue::rule(
            &rule.id,
            "'duration_days' must be at least 1",
        ));
    }

    if let Some(zone) = &rule.timezone
        && zone.parse::<Tz>().is_err()
    {
        report.push(ValidationIssue::rule(
            &rule.id,
            format!("'timezone' is not an IANA zone name: '{zone}'"),
        ));
    }
}

fn validate_condition(rule_id: &str, node: &ConditionNode, report: &mut ValidationReport) {
    match node {
        ConditionNode::And { and: children } | ConditionNode::Or { or: children } => {
            let combinator = match node {
                ConditionNode::And { .. } => "and",
                _ => "or",
            };
            if children.len() < 2 {
                report.push(ValidationIssue::rule(
                    rule_id,
                    format!("'{combinator}' needs at least 2 operands, got {}", children.len()),
                ));
            }
            for child in children {
                validate_condition(rule_id, child, report);
            }
        }
        ConditionNode::Leaf(leaf) => {
            if leaf.is_empty() {
                report.push(ValidationIssue::rule(rule_id, "condition leaf has no filters"));
            }
            if let Some(camera) = &leaf.camera
                && camera.is_empty()
            {
                report.push(ValidationIssue::rule(
                    rule_id,
                    "'camera' filter needs 'make' or 'model'",
                ));
            }
            if let Some(people) = &leaf.people
                && people.include.is_empty()
            {
                report.push(ValidationIssue::rule(
                    rule_id,
                    "'people.include' must not be empty",
                ));
            }
            if let Some(types) = &leaf.asset_types
                && types.is_empty()
            {
                report.push(ValidationIssue::rule(
                    rule_id,
                    "'asset_types' must not be empty",
                ));
            }
            if let Some(tags) = &leaf.tags {
                if tags.include.is_none() && tags.exclude.is_none() {
                    report.push(ValidationIssue::rule(
                        rule_id,
                        "'tags' filter needs 'include' or 'exclude'",
                    ));
                }
                if tags.include.as_ref().is_some_and(Vec::is_empty)
                    || tags.exclude.as_ref().is_some_and(Vec::is_empty)
                {
                    report.push(ValidationIssue::rule(
                        rule_id,
                        "'tags' lists must not be empty",
                    ));
                }
            }
        }
    }
}

/// Parse `MM-DD` into numeric month and day. Strict on shape: exactly two
/// digits each side.
pub(crate) fn parse_month_day(raw: &str) -> Option<(u32, u32)> {
    let (month, day) = raw.split_once('-')?;
    if month.len() != 2 || day.len() != 2 {
        return None;
    }
    if !month.bytes().all(|b| b.is_ascii_digit()) || !day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((month.parse().ok()?, day.parse().ok()?))
}
