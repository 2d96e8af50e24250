//! Recurring-rule expansion: one concrete rule per calendar year.
//!
//! A recurring rule names a month/day, a duration in days, and a year
//! range; expansion materializes a concrete rule per year whose taken
//! window runs from local midnight of the date to local midnight of
//! `date + duration_days`, in the rule's IANA zone (or the deployment
//! default). The arithmetic is wall-clock: a window crossing a DST change
//! is 23 or 25 hours long in UTC, exactly like the day it covers.
//!
//! `02-29` rules expand only in leap years; other years are skipped with a
//! debug log rather than an error.

use chrono::{Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use album_config::{DateRange, RecurringRuleSpec, Rule, RuleEntry};

use crate::error::{Error, Result};

/// Flatten a lowered rule list: concrete entries pass through, recurring
/// entries expand in place, preserving file order.
pub fn expand_rules(entries: &[RuleEntry], default_zone: Tz) -> Result<Vec<Rule>> {
    let mut rules = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            RuleEntry::Concrete(rule) => rules.push(rule.clone()),
            RuleEntry::Recurring(spec) => rules.extend(expand(spec, default_zone)?),
        }
    }
    Ok(rules)
}

/// Expand one recurring rule across its inclusive year range.
pub fn expand(spec: &RecurringRuleSpec, default_zone: Tz) -> Result<Vec<Rule>> {
    let zone = spec.timezone.unwrap_or(default_zone);
    let (first_year, last_year) = spec.years;

    let mut rules = Vec::new();
    for year in first_year..=last_year {
        let Some(date) = NaiveDate::from_ymd_opt(year, spec.month, spec.day) else {
            debug!(
                rule = %spec.id,
                year,
                "skipping year without {:02}-{:02}",
                spec.month,
                spec.day
            );
            continue;
        };
        let end_date = date
            .checked_add_days(chrono::Days::new(u64::from(spec.duration_days)))
            .ok_or_else(|| Error::RecurringExpansion {
                rule_id: spec.id.clone(),
                reason: format!("window end past the calendar for year {year}"),
            })?;

        let start = local_midnight(&spec.id, zone, date)?;
        let end = local_midnight(&spec.id, zone, end_date)?;

        rules.push(Rule {
            id: format!("{}-{}", spec.id, year),
            album_name: spec
                .album_name_template
                .replace("{year}", &year.to_string()),
            description: spec.description.clone(),
            taken: DateRange::new(Some(start), Some(end)),
            created: DateRange::default(),
            condition: spec.condition.clone(),
            share_with: spec.share_with.clone(),
            fuzzy_match: spec.fuzzy_match,
        });
    }
    Ok(rules)
}

/// UTC instant of local midnight on `date` in `zone`.
///
/// Ambiguous midnight (clocks fell back across it) resolves to the earlier
/// instant. Nonexistent midnight (clocks sprang forward across it) resolves
/// to the first hour of the day that exists.
fn local_midnight(rule_id: &str, zone: Tz, date: NaiveDate) -> Result<chrono::DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    match zone.from_local_datetime(&midnight) {
        LocalResult::Single(instant) => Ok(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _later) => Ok(earlier.with_timezone(&Utc)),
        LocalResult::None => {
            for hour in 1..24 {
                let candidate = midnight + Duration::hours(hour);
                match zone.from_local_datetime(&candidate) {
                    LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => {
                        return Ok(instant.with_timezone(&Utc));
                    }
                    LocalResult::None => {}
                }
            }
            Err(Error::RecurringExpansion {
                rule_id: rule_id.to_string(),
                reason: format!("no valid local time exists on {date} in {zone}"),
            })
        }
    }
}
