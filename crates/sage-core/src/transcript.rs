//! Transcript message types.
//!
//! The host owns the on-disk session format; Sage only needs the role and the
//! flattened text of each message. Hook payloads carry these directly, and
//! [`parse_jsonl`] reads the one-message-per-line export format.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Author of a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Human (or parent agent) input.
    User,
    /// Model output.
    Assistant,
    /// Tool result text.
    Tool,
    /// System prompt or host notice.
    System,
}

/// A single message with its text flattened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    /// Who wrote the message.
    pub role: MessageRole,
    /// Flattened text content.
    #[serde(default)]
    pub text: String,
}

impl TranscriptMessage {
    /// Create a message.
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// Shorthand for a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    /// Shorthand for an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    /// Shorthand for a tool result message.
    pub fn tool(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, text)
    }

    /// Whether this message came from the user or the assistant.
    pub fn is_conversational(&self) -> bool {
        matches!(self.role, MessageRole::User | MessageRole::Assistant)
    }
}

/// Ordered list of messages from a finished session.
pub type Transcript = Vec<TranscriptMessage>;

/// A transcript line that could not be parsed.
#[derive(Debug, Error)]
#[error("transcript line {line}: {source}")]
pub struct TranscriptParseError {
    /// 1-based line number.
    pub line: usize,
    /// Underlying JSON error.
    #[source]
    pub source: serde_json::Error,
}

/// Parse a JSONL transcript, skipping malformed lines.
///
/// Returns the parsed messages together with the errors for skipped lines.
/// Blank lines are ignored silently.
pub fn parse_jsonl(input: &str) -> (Transcript, Vec<TranscriptParseError>) {
    let mut messages = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptMessage>(line) {
            Ok(msg) => messages.push(msg),
            Err(source) => {
                warn!(line = idx + 1, error = %source, "skipping malformed transcript line");
                errors.push(TranscriptParseError {
                    line: idx + 1,
                    source,
                });
            }
        }
    }

    (messages, errors)
}
