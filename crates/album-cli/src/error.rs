//! Error types for album-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from album-core
    #[error(transparent)]
    Core(#[from] album_core::Error),

    /// Error from the rules file
    #[error(transparent)]
    Config(#[from] album_config::ConfigError),

    /// Error from the catalog client
    #[error(transparent)]
    Catalog(#[from] album_catalog::CatalogError),

    /// Error from the membership store
    #[error(transparent)]
    Store(#[from] album_store::StoreError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
