//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SageSettings::default()`]
//! 2. If `~/.sage/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)
//!
//! Arrays replacing wholesale matters for the domain and rewrite tables: a
//! user file that lists `domains` owns the whole table.

use std::path::{Path, PathBuf};

use sage_core::constants::STATE_DIR;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{EmbeddingProviderKind, SageSettings};
use crate::validate::validate;

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string())
}

/// Resolve the path to the settings file (`~/.sage/settings.json`).
pub fn settings_path() -> PathBuf {
    PathBuf::from(home_dir()).join(STATE_DIR).join("settings.json")
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => PathBuf::from(home_dir()).join(rest),
        None => PathBuf::from(path),
    }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SageSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, defaults are used. Invalid JSON or a settings
/// table that fails validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SageSettings> {
    let defaults = serde_json::to_value(SageSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SageSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut SageSettings) {
    if let Some(v) = read_env_string("SAGE_KNOWLEDGE_DIR") {
        settings.knowledge.dir = v;
    }
    if let Some(v) = read_env_string("SAGE_VECTOR_DB") {
        settings.knowledge.vector_db_path = v;
    }
    if let Some(v) = read_env_string("SAGE_SESSION_DIR") {
        settings.knowledge.session_dir = v;
    }
    if let Some(v) = read_env_string("SAGE_EMBEDDING_PROVIDER") {
        match parse_provider_kind(&v) {
            Some(kind) => settings.embedding.provider = kind,
            None => tracing::warn!(key = "SAGE_EMBEDDING_PROVIDER", value = %v, "unknown provider, ignoring"),
        }
    }
    if let Some(v) = read_env_string("SAGE_EMBEDDING_ENDPOINT") {
        settings.embedding.endpoint = v;
    }
    if let Some(v) = read_env_string("SAGE_EMBEDDING_MODEL") {
        settings.embedding.model = v;
    }
    if let Some(v) = read_env_u64("SAGE_RETRIEVAL_TIMEOUT_MS", 50, 10_000) {
        settings.retrieval.timeout_ms = v;
    }
    if let Some(v) = read_env_usize("SAGE_CHAR_BUDGET", 200, 20_000) {
        settings.injection.char_budget = v;
    }
    if let Some(v) = read_env_string("SAGE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a provider name (case-insensitive).
pub fn parse_provider_kind(val: &str) -> Option<EmbeddingProviderKind> {
    match val.to_lowercase().as_str() {
        "hashing" | "local" => Some(EmbeddingProviderKind::Hashing),
        "http" => Some(EmbeddingProviderKind::Http),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"retrieval": {"topK": 3, "timeoutMs": 500}});
        let source = serde_json::json!({"retrieval": {"topK": 5}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["retrieval"]["topK"], 5);
        assert_eq!(merged["retrieval"]["timeoutMs"], 500);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"domains": [{"id": "a"}, {"id": "b"}]});
        let source = serde_json::json!({"domains": [{"id": "c"}]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["domains"], serde_json::json!([{"id": "c"}]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.domains.len(), SageSettings::default().domains.len());
    }

    #[test]
    fn file_overrides_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "domains": [{"id": "render", "keywords": ["render", "manim"]}],
                "injection": {"charBudget": 1200}
            }"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.domains.len(), 1);
        assert_eq!(settings.domains[0].keywords, vec!["render", "manim"]);
        assert_eq!(settings.injection.char_budget, 1200);
        assert_eq!(settings.injection.recent_message_window, 3);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn malformed_domain_table_refuses_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"domains": [{"id": "render", "keywords": []}]}"#).unwrap();
        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidDomainTable(_))
        );
    }

    #[test]
    fn malformed_rule_table_refuses_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"rewriteRules": [{"id": "r", "pattern": "(", "regex": true, "block": "no"}]}"#,
        )
        .unwrap();
        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidRewriteRule { .. })
        );
    }

    #[test]
    fn rule_missing_pattern_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"rewriteRules": [{"id": "r"}]}"#).unwrap();
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Json(_)));
    }

    // ── parsing helpers ─────────────────────────────────────────────

    #[test]
    fn provider_kind_parsing() {
        assert_eq!(parse_provider_kind("HTTP"), Some(EmbeddingProviderKind::Http));
        assert_eq!(parse_provider_kind("local"), Some(EmbeddingProviderKind::Hashing));
        assert_eq!(parse_provider_kind("onnx"), None);
    }

    #[test]
    fn range_parsing() {
        assert_eq!(parse_u64_range("500", 50, 10_000), Some(500));
        assert_eq!(parse_u64_range("10", 50, 10_000), None);
        assert_eq!(parse_u64_range("abc", 50, 10_000), None);
        assert_eq!(parse_usize_range("20001", 200, 20_000), None);
        assert_eq!(parse_usize_range("2000", 200, 20_000), Some(2000));
    }

    #[test]
    fn expand_home_handles_tilde() {
        let p = expand_home("~/.sage/knowledge");
        assert!(!p.to_string_lossy().starts_with('~'));
        assert!(p.ends_with(".sage/knowledge"));
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }
}
