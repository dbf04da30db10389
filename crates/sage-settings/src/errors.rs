//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading, parsing, or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The domain table is malformed.
    #[error("invalid domain table: {0}")]
    InvalidDomainTable(String),
    /// A rewrite rule is malformed.
    #[error("invalid rewrite rule '{id}': {message}")]
    InvalidRewriteRule {
        /// Rule ID (may be empty when the ID itself is the problem).
        id: String,
        /// What is wrong with it.
        message: String,
    },
    /// A settings value was invalid (e.g., out of range).
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
