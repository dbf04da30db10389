//! Session role classification.
//!
//! Every other component is gated on the role of the session a hook fires in.
//! Session keys issued by the host look like `agent:<agent>:<kind>[:<id>]`,
//! e.g. `agent:main:main`, `agent:main:subagent:7f3c`, `agent:ops:cron:nightly`.
//!
//! Anything that does not parse cleanly is treated as [`Role::Main`], which
//! never receives injected context and is never mined for knowledge.

use serde::{Deserialize, Serialize};

/// Role of a session, derived from its key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Long-lived primary session. Also the fallback for unknown keys.
    #[default]
    Main,
    /// Short-lived worker spawned for a bounded sub-task.
    Subagent,
    /// Session started by a scheduler.
    Cron,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Subagent => write!(f, "subagent"),
            Self::Cron => write!(f, "cron"),
        }
    }
}

/// Classify a session key into a [`Role`]. Total and pure.
pub fn classify(session_key: &str) -> Role {
    let segments: Vec<&str> = session_key.split(':').collect();

    if segments.len() < 3 || segments[0] != "agent" {
        return Role::Main;
    }
    if segments
        .iter()
        .any(|s| s.is_empty() || s.chars().any(char::is_whitespace))
    {
        return Role::Main;
    }

    // kind segments start after `agent:<agentId>`; the id must follow the kind
    for pair in segments[2..].windows(2) {
        match pair[0] {
            "subagent" => return Role::Subagent,
            "cron" => return Role::Cron,
            _ => {}
        }
    }
    Role::Main
}
