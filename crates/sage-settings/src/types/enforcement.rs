//! Rewrite rule settings.
//!
//! Rules mutate or block tool calls before they execute. They are matched in
//! table order and the first matching rule wins.

use std::collections::BTreeMap;

use sage_core::Role;
use serde::{Deserialize, Serialize};

fn default_target() -> String {
    "command".to_string()
}

/// A single rewrite rule as written in the settings file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRuleSettings {
    /// Unique rule identifier.
    pub id: String,
    /// Restrict to one tool name. `None` applies to every tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Name of the string parameter the pattern is matched against.
    #[serde(default = "default_target")]
    pub target: String,
    /// Text to look for. Literal unless `regex` is set.
    pub pattern: String,
    /// Treat `pattern` as a regular expression.
    #[serde(default)]
    pub regex: bool,
    /// Literal replacement for every occurrence of the match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Environment variables injected into the tool's execution.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Block the call with this reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    /// Restrict to these session roles. Empty applies to every role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
}

impl RewriteRuleSettings {
    /// Literal-pattern rule with a replacement.
    pub fn replace(id: &str, pattern: &str, replacement: &str) -> Self {
        Self {
            id: id.to_string(),
            tool: None,
            target: default_target(),
            pattern: pattern.to_string(),
            regex: false,
            replacement: Some(replacement.to_string()),
            env: BTreeMap::new(),
            block: None,
            roles: Vec::new(),
        }
    }

    /// Whether the rule does anything when it matches.
    pub fn has_effect(&self) -> bool {
        self.replacement.is_some() || !self.env.is_empty() || self.block.is_some()
    }
}

/// Built-in rewrite rules.
pub fn default_rewrite_rules() -> Vec<RewriteRuleSettings> {
    let mut manim = RewriteRuleSettings::replace(
        "manim-venv",
        "python3 -m manim",
        ".venv/bin/python -m manim",
    );
    let _ = manim
        .env
        .insert("PYTHONUNBUFFERED".to_string(), "1".to_string());

    let force_push = RewriteRuleSettings {
        id: "no-force-push".to_string(),
        tool: None,
        target: default_target(),
        pattern: r"\bgit\s+push\b.*\s(--force|-f)(\s|$)".to_string(),
        regex: true,
        replacement: None,
        env: BTreeMap::new(),
        block: Some("force pushes are not allowed from worker sessions".to_string()),
        roles: vec![Role::Subagent, Role::Cron],
    };

    vec![manim, force_push]
}
