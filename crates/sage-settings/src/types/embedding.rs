//! Embedding provider and retrieval settings.

use serde::{Deserialize, Serialize};

/// Which embedding provider backs retrieval and deduplication.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Local deterministic feature hashing. No network.
    #[default]
    Hashing,
    /// OpenAI-compatible `/embeddings` HTTP endpoint.
    Http,
}

/// Embedding provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Provider implementation.
    pub provider: EmbeddingProviderKind,
    /// Endpoint URL for the HTTP provider.
    pub endpoint: String,
    /// Model name sent to the HTTP provider.
    pub model: String,
    /// Environment variable holding the bearer token. Empty disables auth.
    pub api_key_env: String,
    /// Vector dimensions for the hashing provider.
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hashing,
            endpoint: "http://127.0.0.1:11434/v1/embeddings".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key_env: String::new(),
            dimensions: 256,
        }
    }
}

/// Semantic retrieval parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Whether semantic retrieval runs during injection.
    pub enabled: bool,
    /// Minimum cosine similarity for a hit.
    pub threshold: f32,
    /// Maximum hits returned.
    pub top_k: usize,
    /// Hard deadline on the query embedding call.
    pub timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.30,
            top_k: 3,
            timeout_ms: 500,
        }
    }
}
