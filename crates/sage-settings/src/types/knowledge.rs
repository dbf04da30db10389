//! Knowledge store, injection, and extraction settings.

use serde::{Deserialize, Serialize};

/// Where curated knowledge lives and how duplicates are merged.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeSettings {
    /// Directory holding one curated file per domain (may contain `~`).
    pub dir: String,
    /// `SQLite` file for the vector index (may contain `~`).
    pub vector_db_path: String,
    /// Directory of per-session turn markers shared by hook processes
    /// (may contain `~`).
    pub session_dir: String,
    /// Cosine similarity at or above which a candidate merges into an
    /// existing entry.
    pub dedup_threshold: f32,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            dir: "~/.sage/knowledge".to_string(),
            vector_db_path: "~/.sage/vectors.db".to_string(),
            session_dir: "~/.sage/sessions".to_string(),
            dedup_threshold: 0.85,
        }
    }
}

/// Prompt injection behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InjectionSettings {
    /// Whether `before_prompt_build` injects anything at all.
    pub enabled: bool,
    /// Maximum characters of prepended context.
    pub char_budget: usize,
    /// How many trailing user/assistant messages are scanned for keywords.
    pub recent_message_window: usize,
    /// Entries not updated for this many days carry a staleness caveat.
    pub stale_after_days: i64,
    /// Inject into subagents only on their first turn.
    pub first_turn_only: bool,
    /// Also inject into cron-triggered sessions.
    pub inject_cron: bool,
    /// A lower-priority section is dropped rather than truncated below this
    /// many characters.
    pub min_section_chars: usize,
    /// Maximum entries rendered per domain section.
    pub max_entries_per_domain: usize,
}

impl Default for InjectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            char_budget: 2000,
            recent_message_window: 3,
            stale_after_days: 30,
            first_turn_only: true,
            inject_cron: false,
            min_section_chars: 120,
            max_entries_per_domain: 8,
        }
    }
}

/// Transcript mining parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionSettings {
    /// Whether `agent_end` mines transcripts.
    pub enabled: bool,
    /// Transcripts with fewer messages are skipped.
    pub min_messages: usize,
    /// Cap on candidates produced per transcript.
    pub max_candidates: usize,
    /// Size of the text window examined around a surprise match.
    pub window_chars: usize,
    /// Domain assigned to candidates that match no domain keyword.
    pub fallback_domain: String,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_messages: 4,
            max_candidates: 5,
            window_chars: 240,
            fallback_domain: "general".to_string(),
        }
    }
}
