//! Error types for album-catalog

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Transport-level failure: connect, timeout, TLS.
    #[error("Catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("Catalog API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The catalog answered 2xx but the body was not what we expect.
    #[error("Unexpected catalog response: {0}")]
    Decode(String),

    /// A rule references a person the catalog does not know.
    #[error("Unknown person in catalog: '{name}'")]
    UnknownPerson { name: String },
}
