//! Semantic top-k retrieval over the vector index.
//!
//! Fails open: a slow or broken provider, or a vector index error, yields
//! an empty result and a warning. Only vectors produced by the query's model
//! are ever compared.

use std::sync::Arc;

use sage_embeddings::{EmbeddingProvider, SearchOptions, SharedVectorRepository, embed_with_timeout};
use sage_settings::RetrievalSettings;
use tracing::{debug, warn};

use crate::store::KnowledgeStore;
use crate::types::KnowledgeEntry;

/// A retrieved entry with its similarity.
#[derive(Clone, Debug)]
pub struct ScoredEntry {
    /// The entry.
    pub entry: KnowledgeEntry,
    /// Cosine similarity to the query.
    pub similarity: f32,
}

/// Embedding-backed retriever.
pub struct SemanticRetriever {
    provider: Arc<dyn EmbeddingProvider>,
    vectors: SharedVectorRepository,
    store: Arc<dyn KnowledgeStore>,
    threshold: f32,
    top_k: usize,
    timeout_ms: u64,
}

impl SemanticRetriever {
    /// Create a retriever with default parameters (0.30, top 3, 500 ms).
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        vectors: SharedVectorRepository,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self::with_settings(provider, vectors, store, &RetrievalSettings::default())
    }

    /// Create a retriever from retrieval settings.
    pub fn with_settings(
        provider: Arc<dyn EmbeddingProvider>,
        vectors: SharedVectorRepository,
        store: Arc<dyn KnowledgeStore>,
        settings: &RetrievalSettings,
    ) -> Self {
        Self {
            provider,
            vectors,
            store,
            threshold: settings.threshold,
            top_k: settings.top_k,
            timeout_ms: settings.timeout_ms,
        }
    }

    /// Entries most similar to `query`, best first.
    pub async fn retrieve(&self, query: &str) -> Vec<KnowledgeEntry> {
        self.retrieve_scored(query)
            .await
            .into_iter()
            .map(|s| s.entry)
            .collect()
    }

    /// Like [`Self::retrieve`] but keeps similarities.
    pub async fn retrieve_scored(&self, query: &str) -> Vec<ScoredEntry> {
        if query.trim().is_empty() || self.top_k == 0 {
            return Vec::new();
        }

        let embedding =
            match embed_with_timeout(self.provider.as_ref(), query, self.timeout_ms).await {
                Ok(embedding) => embedding,
                Err(error) => {
                    warn!(%error, "query embedding failed, skipping semantic retrieval");
                    return Vec::new();
                }
            };

        let opts = SearchOptions {
            limit: self.top_k,
            domain: None,
            min_similarity: self.threshold,
        };
        let hits = {
            let repo = self.vectors.lock();
            repo.search(&embedding.model_id, &embedding.vector, &opts)
        };
        let hits = match hits {
            Ok(hits) => hits,
            Err(error) => {
                warn!(%error, "vector search failed, skipping semantic retrieval");
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.store.get(&hit.domain, &hit.entry_id).await {
                Ok(Some(entry)) => results.push(ScoredEntry {
                    entry,
                    similarity: hit.similarity,
                }),
                Ok(None) => debug!(entry_id = %hit.entry_id, "vector points at a missing entry"),
                Err(error) => warn!(entry_id = %hit.entry_id, %error, "failed to load retrieved entry"),
            }
        }
        results
    }
}
