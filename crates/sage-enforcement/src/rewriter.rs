//! Rewrite rule compilation and application.

use std::collections::BTreeMap;

use regex::Regex;
use sage_core::Role;
use sage_settings::{RewriteRuleSettings, SageSettings};
use serde_json::Value;
use tracing::{debug, warn};

/// How a rule finds its text.
#[derive(Debug)]
enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    /// Byte spans of non-empty, non-overlapping matches, left to right.
    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            Self::Literal(p) => text
                .match_indices(p.as_str())
                .map(|(start, m)| (start, start + m.len()))
                .collect(),
            Self::Regex(re) => re
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Literal(p) => text.contains(p.as_str()),
            Self::Regex(re) => re.find_iter(text).any(|m| !m.is_empty()),
        }
    }
}

/// Every (possibly overlapping) occurrence of `needle` in `text`.
fn occurrences(text: &str, needle: &str) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(offset) = text[from..].find(needle) {
        let start = from + offset;
        spans.push((start, start + needle.len()));
        from = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
    spans
}

/// Upper bound on rewrite passes over one value.
const MAX_PASSES: usize = 64;

#[derive(Debug)]
struct CompiledRule {
    id: String,
    tool: Option<String>,
    target: String,
    pattern: Pattern,
    replacement: Option<String>,
    env: BTreeMap<String, String>,
    block: Option<String>,
    roles: Vec<Role>,
}

impl CompiledRule {
    fn compile(rule: &RewriteRuleSettings) -> Result<Self, String> {
        if rule.pattern.is_empty() {
            return Err("empty match pattern".into());
        }
        if rule.target.trim().is_empty() {
            return Err("empty target parameter".into());
        }
        if !rule.has_effect() {
            return Err("rule has no effect".into());
        }
        let pattern = if rule.regex {
            Pattern::Regex(Regex::new(&rule.pattern).map_err(|e| format!("invalid regex: {e}"))?)
        } else {
            Pattern::Literal(rule.pattern.clone())
        };
        Ok(Self {
            id: rule.id.clone(),
            tool: rule.tool.clone(),
            target: rule.target.clone(),
            pattern,
            replacement: rule.replacement.clone(),
            env: rule.env.clone(),
            block: rule.block.clone(),
            roles: rule.roles.clone(),
        })
    }

    fn applies_to(&self, tool: &str, role: Role) -> bool {
        self.tool.as_deref().is_none_or(|t| t == tool)
            && (self.roles.is_empty() || self.roles.contains(&role))
    }

    /// Whether `text` already carries this rule's replacement.
    fn carries_replacement(&self, text: &str) -> bool {
        self.replacement
            .as_deref()
            .is_some_and(|r| !r.is_empty() && text.contains(r))
    }

    /// Rewrite `text`, or `None` when it must stay as is.
    ///
    /// Passes repeat until nothing changes, so the result is a fixpoint and
    /// rewriting it again is a no-op. A rule that does not settle within the
    /// pass and growth limits leaves the value untouched.
    fn rewrite_text(&self, text: &str) -> Option<String> {
        let replacement = self.replacement.as_deref()?;
        let limit = text.len().saturating_mul(8).max(4096);
        let mut current = text.to_string();
        for _ in 0..MAX_PASSES {
            let Some(next) = self.rewrite_pass(&current, replacement) else {
                return (current != text).then_some(current);
            };
            if next.len() > limit {
                break;
            }
            current = next;
        }
        warn!(rule_id = %self.id, "rewrite does not settle, leaving value unchanged");
        None
    }

    /// One left-to-right pass. A match lying inside an existing copy of the
    /// replacement is left alone; every other match is replaced.
    fn rewrite_pass(&self, text: &str, replacement: &str) -> Option<String> {
        let applied = occurrences(text, replacement);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut replaced = false;
        for (start, end) in self.pattern.spans(text) {
            if applied.iter().any(|&(s, e)| s <= start && end <= e) {
                continue;
            }
            out.push_str(&text[last..start]);
            out.push_str(replacement);
            last = end;
            replaced = true;
        }
        if !replaced {
            return None;
        }
        out.push_str(&text[last..]);
        (out != text).then_some(out)
    }
}

/// Result of passing a tool call through the rewriter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RewriteOutcome {
    /// Parameters to execute with (unchanged when nothing matched).
    pub params: Value,
    /// Environment variables to inject into the execution.
    pub env: BTreeMap<String, String>,
    /// Block reason, if the call must not run.
    pub block: Option<String>,
    /// Rule that matched.
    pub rule_id: Option<String>,
}

impl RewriteOutcome {
    fn passthrough(params: &Value) -> Self {
        Self {
            params: params.clone(),
            ..Self::default()
        }
    }

    /// Whether a rule matched.
    pub fn matched(&self) -> bool {
        self.rule_id.is_some()
    }
}

/// Ordered, first-match-wins rewrite table.
#[derive(Debug, Default)]
pub struct EnforcementRewriter {
    rules: Vec<CompiledRule>,
}

impl EnforcementRewriter {
    /// Compile rules, skipping malformed ones with a warning.
    pub fn from_rules(rules: &[RewriteRuleSettings]) -> Self {
        let compiled: Vec<CompiledRule> = rules
            .iter()
            .filter_map(|rule| match CompiledRule::compile(rule) {
                Ok(c) => Some(c),
                Err(reason) => {
                    warn!(rule_id = %rule.id, %reason, "skipping malformed rewrite rule");
                    None
                }
            })
            .collect();
        debug!(rule_count = compiled.len(), "EnforcementRewriter initialized");
        Self { rules: compiled }
    }

    /// Compile the rule table from settings.
    pub fn from_settings(settings: &SageSettings) -> Self {
        Self::from_rules(&settings.rewrite_rules)
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are active.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the first matching rule to a tool call.
    pub fn rewrite(&self, tool: &str, params: &Value, role: Role) -> RewriteOutcome {
        for rule in &self.rules {
            if !rule.applies_to(tool, role) {
                continue;
            }
            let Some(text) = params.get(&rule.target).and_then(Value::as_str) else {
                continue;
            };
            if !rule.pattern.is_match(text) && !rule.carries_replacement(text) {
                continue;
            }

            debug!(rule_id = %rule.id, tool, "rewrite rule matched");
            let mut outcome = RewriteOutcome {
                params: params.clone(),
                env: rule.env.clone(),
                block: rule.block.clone(),
                rule_id: Some(rule.id.clone()),
            };
            if outcome.block.is_none() {
                if let Some(rewritten) = rule.rewrite_text(text) {
                    if let Some(obj) = outcome.params.as_object_mut() {
                        let _ = obj.insert(rule.target.clone(), Value::String(rewritten));
                    }
                }
            }
            return outcome;
        }
        RewriteOutcome::passthrough(params)
    }
}
