//! Error types for album-core

/// Result type for album-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in album-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A rule's condition tree cannot be planned or evaluated
    #[error("Invalid condition in rule '{rule_id}': {reason}")]
    InvalidCondition { rule_id: String, reason: String },

    /// DNF expansion of a condition tree exceeded the query ceiling
    #[error(
        "Rule '{rule_id}' expands to {queries} catalog queries (limit {limit}); split the rule or raise max_queries_per_rule"
    )]
    PlanTooLarge {
        rule_id: String,
        queries: usize,
        limit: usize,
    },

    /// A recurring rule produced an impossible calendar instant
    #[error("Recurring rule '{rule_id}': {reason}")]
    RecurringExpansion { rule_id: String, reason: String },

    // Transparent wrappers for underlying crate errors
    /// Catalog error from album-catalog
    #[error(transparent)]
    Catalog(#[from] album_catalog::CatalogError),

    /// Store error from album-store
    #[error(transparent)]
    Store(#[from] album_store::StoreError),
}
