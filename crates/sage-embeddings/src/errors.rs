//! Embedding error types.
//!
//! All embedding errors are non-fatal: retrieval degrades to "no semantic
//! hits" and deduplication degrades to exact text comparison.

use thiserror::Error;

/// Errors from embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider did not answer within the deadline.
    #[error("embedding timed out after {timeout_ms}ms")]
    Timeout {
        /// Deadline that elapsed.
        timeout_ms: u64,
    },

    /// Transport-level HTTP failure (preserves source chain).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The provider answered with something that is not an embedding.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// `SQLite` error (preserves source chain).
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Vector storage operation failed (non-SQLite).
    #[error("storage failed: {0}")]
    Storage(String),
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;
