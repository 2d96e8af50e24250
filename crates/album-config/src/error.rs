//! Error types for album-config

use std::path::PathBuf;

use crate::validation::ValidationReport;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read rules file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse rules file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Rule '{rule_id}' is missing required field '{field}'")]
    MissingField { rule_id: String, field: &'static str },

    #[error("Invalid condition in rule '{rule_id}': {reason}")]
    InvalidCondition { rule_id: String, reason: String },

    #[error("Invalid recurring rule '{rule_id}': {reason}")]
    InvalidRecurringRule { rule_id: String, reason: String },

    #[error("Rules file failed validation:\n{0}")]
    Invalid(ValidationReport),
}
