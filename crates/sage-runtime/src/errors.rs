//! Runtime error types.

use thiserror::Error;

/// Errors that stop the engine from starting.
///
/// Once running, nothing here surfaces: hooks fail open.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Settings failed validation.
    #[error(transparent)]
    Settings(#[from] sage_settings::SettingsError),

    /// Embedding provider or vector index could not be set up.
    #[error(transparent)]
    Embedding(#[from] sage_embeddings::EmbeddingError),

    /// Domain table or store could not be set up.
    #[error(transparent)]
    Knowledge(#[from] sage_knowledge::KnowledgeError),
}

/// Result alias for runtime setup.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sage_settings::SettingsError;

    #[test]
    fn settings_errors_pass_through() {
        let err: RuntimeError = SettingsError::InvalidValue("bad".into()).into();
        assert_eq!(
            err.to_string(),
            SettingsError::InvalidValue("bad".into()).to_string()
        );
    }
}
