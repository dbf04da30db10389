//! Local bag-of-words embeddings via signed feature hashing.
//!
//! Each lowercase alphanumeric token (stopwords removed) is hashed with
//! SHA-256; the first eight bytes pick a bucket and the ninth picks a sign.
//! The result is L2-normalized, so cosine similarity tracks vocabulary
//! overlap. No network, fully deterministic, good enough to recognize a
//! reworded lesson as the same lesson.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::normalize::l2_normalize;
use crate::provider::{Embedding, EmbeddingProvider};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "with",
];

/// Deterministic hashing embedding provider.
pub struct HashingEmbeddingProvider {
    dims: usize,
    model_id: String,
}

impl HashingEmbeddingProvider {
    /// Create a provider producing `dims`-dimensional vectors.
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            model_id: format!("hashing-bow-{dims}"),
        }
    }

    /// Output dimensions.
    pub fn dimensions(&self) -> usize {
        self.dims
    }

    /// Embed synchronously.
    #[allow(clippy::cast_possible_truncation)]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; self.dims];
        for token in tokenize(text) {
            let hash = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0_u8; 8];
            bucket_bytes.copy_from_slice(&hash[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if hash[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

/// Split text into lowercase alphanumeric tokens, dropping stopwords.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(Embedding {
            vector: self.embed_sync(text),
            model_id: self.model_id.clone(),
        })
    }
}
