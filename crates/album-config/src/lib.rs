//! Rule configuration for Album Manager.
//!
//! This crate owns the YAML rules-file schema: concrete and recurring rule
//! definitions, condition trees, sharing directives, and the tunable
//! settings block. Loading goes through three stages — parse, validate,
//! lower — so that every semantic problem in a rules file is reported
//! before any rule runs.

pub mod conditions;
pub mod error;
pub mod loader;
pub mod model;
pub mod validation;

pub use conditions::{CameraFilter, ConditionNode, LeafCondition, PeopleFilter, TagFilter};
pub use error::{ConfigError, Result};
pub use loader::{load_rules_file, load_rules_str};
pub use model::{
    AssetKind, DateRange, RecurringRuleSpec, Rule, RuleEntry, RuleSet, Settings, ShareWith,
    SyncMode,
};
pub use validation::{ValidationIssue, ValidationReport};
