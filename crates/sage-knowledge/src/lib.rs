//! # sage-knowledge
//!
//! Everything that touches curated knowledge:
//!
//! - [`types`]: entries, provenance, candidates
//! - [`format`]: the per-domain markdown file format
//! - [`store`]: [`KnowledgeStore`] trait and the file-backed
//!   [`CuratedKnowledgeStore`] with merge-on-write deduplication
//! - [`matcher`]: keyword classification of prompts into domains
//! - [`injection`]: budgeted composition of the prepended context
//! - [`retriever`]: semantic top-k lookup over the vector index
//! - [`extractor`]: surprise mining of finished transcripts

#![deny(unsafe_code)]

pub mod errors;
pub mod extractor;
pub mod format;
pub mod injection;
pub mod matcher;
pub mod retriever;
pub mod store;
pub mod types;

pub use errors::{KnowledgeError, Result};
pub use extractor::TranscriptExtractor;
pub use injection::{ComposeOptions, compose};
pub use matcher::DomainMatcher;
pub use retriever::SemanticRetriever;
pub use store::{CuratedKnowledgeStore, KnowledgeStore};
pub use types::{Candidate, EntryField, KnowledgeEntry, ProvenanceRecord, WriteOutcome};
