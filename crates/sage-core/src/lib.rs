//! # sage-core
//!
//! Foundation types shared by every Sage crate:
//!
//! - **Branded IDs**: [`ids::EntryId`] newtype over a UUID v7 string
//! - **Session roles**: [`session::classify`] maps a session key to a [`session::Role`]
//! - **Transcripts**: [`transcript::TranscriptMessage`] and JSONL parsing
//! - **Clock**: [`clock::MonotonicClock`] for last-write-wins ordering
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod clock;
pub mod constants;
pub mod ids;
pub mod logging;
pub mod session;
pub mod transcript;

pub use clock::MonotonicClock;
pub use ids::EntryId;
pub use session::{Role, classify};
pub use transcript::{MessageRole, Transcript, TranscriptMessage, TranscriptParseError};
