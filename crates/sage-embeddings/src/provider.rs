//! Embedding provider trait and factory.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sage_settings::{EmbeddingProviderKind, EmbeddingSettings};

use crate::errors::{EmbeddingError, Result};
use crate::hashing::HashingEmbeddingProvider;
use crate::http::HttpEmbeddingProvider;

/// A vector together with the model that produced it.
///
/// Vectors from different models are never compared.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding {
    /// Embedding components.
    pub vector: Vec<f32>,
    /// Identifier of the producing model.
    pub model_id: String,
}

/// Trait for embedding text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the model this provider embeds with.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Run [`EmbeddingProvider::embed`] under a hard deadline.
pub async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout_ms: u64,
) -> Result<Embedding> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), provider.embed(text)).await {
        Ok(result) => result,
        Err(_) => Err(EmbeddingError::Timeout { timeout_ms }),
    }
}

/// Build the provider selected by settings.
pub fn build_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.provider {
        EmbeddingProviderKind::Hashing => {
            Ok(Arc::new(HashingEmbeddingProvider::new(settings.dimensions)))
        }
        EmbeddingProviderKind::Http => {
            let api_key = if settings.api_key_env.is_empty() {
                None
            } else {
                std::env::var(&settings.api_key_env)
                    .ok()
                    .filter(|k| !k.is_empty())
            };
            let provider =
                HttpEmbeddingProvider::new(settings.endpoint.clone(), settings.model.clone(), api_key)?;
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn model_id(&self) -> &str {
            "slow"
        }

        async fn embed(&self, _text: &str) -> Result<Embedding> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Embedding {
                vector: vec![1.0],
                model_id: "slow".into(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_maps_to_error() {
        let err = embed_with_timeout(&SlowProvider, "x", 50).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn within_deadline_passes_through() {
        let provider = HashingEmbeddingProvider::new(16);
        let emb = embed_with_timeout(&provider, "render scene", 500).await.unwrap();
        assert_eq!(emb.vector.len(), 16);
        assert_eq!(emb.model_id, provider.model_id());
    }

    #[test]
    fn build_hashing_by_default() {
        let provider = build_provider(&EmbeddingSettings::default()).unwrap();
        assert_eq!(provider.model_id(), "hashing-bow-256");
    }

    #[test]
    fn build_http_uses_model_name() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProviderKind::Http,
            model: "text-embedding-3-small".into(),
            ..EmbeddingSettings::default()
        };
        let provider = build_provider(&settings).unwrap();
        assert_eq!(provider.model_id(), "text-embedding-3-small");
    }
}
