//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON
//! settings file. Each type implements [`Default`] with production values and
//! is marked `#[serde(default)]`, so a partial file only needs the keys it
//! changes.

mod domains;
mod embedding;
mod enforcement;
mod knowledge;

pub use domains::*;
pub use embedding::*;
pub use enforcement::*;
pub use knowledge::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the Sage engine.
///
/// # JSON Format
///
/// ```json
/// {
///   "knowledge": { "dir": "~/.sage/knowledge" },
///   "domains": [{ "id": "render", "keywords": ["render", "manim"] }],
///   "retrieval": { "timeoutMs": 500 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SageSettings {
    /// Settings schema version.
    pub version: String,
    /// Knowledge store locations and merge policy.
    pub knowledge: KnowledgeSettings,
    /// Ordered domain table. Order defines injection priority.
    pub domains: Vec<DomainSettings>,
    /// Ordered rewrite rules, applied first-match-wins.
    pub rewrite_rules: Vec<RewriteRuleSettings>,
    /// Prompt injection behavior.
    pub injection: InjectionSettings,
    /// Semantic retrieval parameters.
    pub retrieval: RetrievalSettings,
    /// Embedding provider selection.
    pub embedding: EmbeddingSettings,
    /// Transcript mining parameters.
    pub extraction: ExtractionSettings,
    /// Hook execution budget.
    pub hooks: HookSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for SageSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            knowledge: KnowledgeSettings::default(),
            domains: default_domains(),
            rewrite_rules: default_rewrite_rules(),
            injection: InjectionSettings::default(),
            retrieval: RetrievalSettings::default(),
            embedding: EmbeddingSettings::default(),
            extraction: ExtractionSettings::default(),
            hooks: HookSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Hook execution budget.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HookSettings {
    /// Per-hook deadline in milliseconds. `before_prompt_build` additionally
    /// gets the retrieval timeout on top of this.
    pub timeout_ms: u64,
    /// How long shutdown waits for background `agent_end` work.
    pub drain_timeout_ms: u64,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 300,
            drain_timeout_ms: 5_000,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
