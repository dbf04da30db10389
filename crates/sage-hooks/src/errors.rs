//! Hook error types.

use thiserror::Error;

/// Errors that can occur during hook execution.
///
/// None of these reach the host: the engine logs them and answers
/// [`HookResponse::None`](crate::types::HookResponse::None).
#[derive(Debug, Error)]
pub enum HookError {
    /// Hook execution timed out.
    #[error("Hook timed out after {timeout_ms}ms: {name}")]
    Timeout {
        /// Hook name that timed out.
        name: String,
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// Hook handler returned an error.
    #[error("Hook handler error in '{name}': {message}")]
    HandlerError {
        /// Hook name.
        name: String,
        /// Error message from handler.
        message: String,
    },

    /// Hook handler panicked.
    #[error("Hook handler '{name}' panicked")]
    Panicked {
        /// Hook name.
        name: String,
    },

    /// Payload could not be decoded.
    #[error("Invalid hook payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl HookError {
    /// Wrap any displayable error as a handler error.
    pub fn handler(name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::HandlerError {
            name: name.into(),
            message: error.to_string(),
        }
    }
}
