//! Knowledge error types.

use thiserror::Error;

/// Errors from knowledge store and matcher operations.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Filesystem error (preserves source chain).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A candidate was rejected before touching the store.
    #[error("invalid candidate: {0}")]
    InvalidCandidate(String),

    /// One entry of a knowledge file could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line of the offending entry header or field.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// The domain table or another setting is unusable.
    #[error(transparent)]
    Config(#[from] sage_settings::SettingsError),

    /// Vector index failure.
    #[error(transparent)]
    Embedding(#[from] sage_embeddings::EmbeddingError),

    /// Atomic replace of a domain file failed.
    #[error("failed to persist {path}: {message}")]
    Persist {
        /// Target file.
        path: String,
        /// Underlying error.
        message: String,
    },
}

/// Result alias for knowledge operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;
