//! # sage-embeddings
//!
//! Embedding providers and vector search for the Sage knowledge engine.
//!
//! - [`provider::EmbeddingProvider`]: the `embed(text) -> {vector, modelId}`
//!   seam to the external embedding service
//! - [`http::HttpEmbeddingProvider`]: OpenAI-compatible HTTP endpoint
//! - [`hashing::HashingEmbeddingProvider`]: deterministic local feature hashing
//! - [`vector_repo::VectorRepository`]: `SQLite` BLOB storage keyed by
//!   `(entry_id, model_id)` with brute-force cosine KNN
//!
//! All embedding errors are non-fatal to callers: retrieval fails open.

#![deny(unsafe_code)]

pub mod errors;
pub mod hashing;
pub mod http;
pub mod normalize;
pub mod provider;
pub mod vector_repo;

pub use errors::{EmbeddingError, Result};
pub use hashing::HashingEmbeddingProvider;
pub use http::HttpEmbeddingProvider;
pub use provider::{Embedding, EmbeddingProvider, build_provider, embed_with_timeout};
pub use vector_repo::{SearchOptions, SharedVectorRepository, VectorHit, VectorRepository};
