//! Error types for Weft

use thiserror::Error;

/// Result type alias using Weft's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Weft error types
///
/// Extraction failures are recovered at the gateway boundary (the ingestion
/// pipeline tolerates them as "zero entities"); every other variant propagates
/// to the caller untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// No authenticated identity in the request scope. Produced by the
    /// transport collaborator, never by this core.
    #[error("No authenticated user in request scope")]
    Unauthenticated,

    /// A referenced node or relationship endpoint does not exist or is not
    /// owned by the caller. Cross-owner references are indistinguishable
    /// from missing nodes.
    #[error("Node '{0}' not found")]
    NotFound(String),

    /// The NLP collaborator failed or timed out.
    #[error("Entity extraction unavailable: {0}")]
    ExtractionUnavailable(String),

    /// Malformed input, rejected before any side effect.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Underlying graph-database operation failed; fatal to the whole
    /// ingestion or query.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error is recoverable by the ingestion pipeline
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ExtractionUnavailable(_))
    }
}
