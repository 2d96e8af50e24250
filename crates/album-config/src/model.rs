//! Rules-file schema and the lowered rule model.
//!
//! Raw types ([`RulesFile`], [`RuleConfig`]) mirror the YAML exactly and are
//! what validation runs against. Lowered types ([`Rule`],
//! [`RecurringRuleSpec`]) are what the sync engine consumes: dates parsed,
//! timezones resolved, the legacy `filters` block folded into a condition
//! tree.

use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::conditions::{ConditionNode, LeafCondition};

/// Catalog asset kinds, serialized with the catalog's uppercase wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Other,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "IMAGE",
            AssetKind::Video => "VIDEO",
            AssetKind::Audio => "AUDIO",
            AssetKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open UTC interval `[start, end)`, either end optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        if let Some(start) = self.start
            && instant < start
        {
            return false;
        }
        if let Some(end) = self.end
            && instant >= end
        {
            return false;
        }
        true
    }
}

/// File-level membership mode.
///
/// `AddOnly` only ever grows albums; `Sync` also removes assets that no
/// longer match their rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    AddOnly,
    Sync,
}

/// Sharing directive on a rule or from the deployment defaults.
///
/// YAML accepts the literal string `"ALL"` or a list of user emails. An
/// empty list is meaningful: it pins the album private regardless of any
/// global sharing default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareWith {
    All,
    Users(Vec<String>),
}

impl Serialize for ShareWith {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ShareWith::All => serializer.serialize_str("ALL"),
            ShareWith::Users(users) => users.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ShareWith {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            List(Vec<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) if s == "ALL" => Ok(ShareWith::All),
            Raw::Text(s) => Err(D::Error::custom(format!(
                "share_with must be \"ALL\" or a list of emails, got \"{s}\""
            ))),
            Raw::List(users) => Ok(ShareWith::Users(users)),
        }
    }
}

/// Tunables from the optional top-level `settings` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// Fuzzy time window in minutes.
    pub time_window_minutes: u32,
    /// Fuzzy distance window in meters.
    pub distance_meters: f64,
    /// Query-plan ceiling per rule.
    pub max_queries_per_rule: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_window_minutes: 60,
            distance_meters: 100.0,
            max_queries_per_rule: 64,
        }
    }
}

/// Raw rules file, exactly as authored.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default)]
    pub settings: Settings,
    pub rules: Vec<RuleConfig>,
}

/// One raw rule entry. Concrete and recurring rules share this shape; which
/// fields are required depends on the `recurring` flag and is enforced by
/// validation, not by serde.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub id: String,
    #[serde(default)]
    pub recurring: bool,

    // Concrete rules.
    pub album_name: Option<String>,
    pub taken_after: Option<String>,
    pub taken_before: Option<String>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,

    // Recurring rules.
    pub month_day: Option<String>,
    pub duration_days: Option<u32>,
    pub year_range: Option<Vec<i32>>,
    pub album_name_template: Option<String>,
    pub timezone: Option<String>,

    // Shared.
    pub description: Option<String>,
    pub filters: Option<LeafCondition>,
    pub conditions: Option<ConditionNode>,
    pub share_with: Option<ShareWith>,
    pub fuzzy_match: Option<bool>,
}

/// A concrete rule, ready to execute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: String,
    pub album_name: String,
    pub description: Option<String>,
    pub taken: DateRange,
    pub created: DateRange,
    /// `None` means the rule is constrained by its date ranges alone.
    pub condition: Option<ConditionNode>,
    pub share_with: Option<ShareWith>,
    pub fuzzy_match: Option<bool>,
}

/// A recurring rule after lowering: `MM-DD` split, years pinned, timezone
/// resolved against the IANA database (or deferred to the deployment
/// default when the rule omits it).
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringRuleSpec {
    pub id: String,
    pub month: u32,
    pub day: u32,
    pub duration_days: u32,
    pub years: (i32, i32),
    pub album_name_template: String,
    pub description: Option<String>,
    pub timezone: Option<Tz>,
    pub condition: Option<ConditionNode>,
    pub share_with: Option<ShareWith>,
    pub fuzzy_match: Option<bool>,
}

/// A lowered rules-file entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEntry {
    Concrete(Rule),
    Recurring(RecurringRuleSpec),
}

impl RuleEntry {
    pub fn id(&self) -> &str {
        match self {
            RuleEntry::Concrete(rule) => &rule.id,
            RuleEntry::Recurring(spec) => &spec.id,
        }
    }
}

/// The loaded, validated, lowered rules file.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub mode: SyncMode,
    pub settings: Settings,
    pub entries: Vec<RuleEntry>,
}
