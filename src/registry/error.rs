//! Error types for source registry operations

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while reading or writing source records
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No source with the given id exists
    #[error("source not found: {0}")]
    NotFound(String),

    /// The update targeted one id but carried a record for another
    #[error("source id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },

    /// Invalid paging parameters
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Backend-specific error
    #[error("registry backend error: {0}")]
    Backend(String),
}
