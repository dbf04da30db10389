//! Keyword classification of prompts into knowledge domains.
//!
//! Each domain's keywords compile into one case-insensitive alternation
//! anchored at a word start: `render` matches "rendering" but `ui` does not
//! match "build". Multi-word keywords tolerate any run of whitespace.

use regex::Regex;
use sage_core::TranscriptMessage;
use sage_settings::validate::validate_domains;
use sage_settings::{DomainSettings, SettingsError};

use crate::errors::Result;

#[derive(Debug)]
struct CompiledDomain {
    id: String,
    pattern: Regex,
}

/// Compiled domain table.
#[derive(Debug)]
pub struct DomainMatcher {
    domains: Vec<CompiledDomain>,
}

fn keyword_pattern(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

impl DomainMatcher {
    /// Validate and compile a domain table. Order is priority order.
    pub fn new(domains: &[DomainSettings]) -> Result<Self> {
        validate_domains(domains)?;
        let mut compiled = Vec::with_capacity(domains.len());
        for domain in domains {
            let alternation = domain
                .keywords
                .iter()
                .map(|k| keyword_pattern(k))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = Regex::new(&format!(r"(?i)(?:^|[^\w])(?:{alternation})")).map_err(|e| {
                SettingsError::InvalidDomainTable(format!("domain '{}': {e}", domain.id))
            })?;
            compiled.push(CompiledDomain {
                id: domain.id.clone(),
                pattern,
            });
        }
        Ok(Self { domains: compiled })
    }

    /// Domain ids in priority order.
    pub fn domain_ids(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|d| d.id.as_str())
    }

    /// Whether the table has no domains.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Domains whose keywords occur in `text`, in priority order.
    pub fn match_text(&self, text: &str) -> Vec<String> {
        self.domains
            .iter()
            .filter(|d| d.pattern.is_match(text))
            .map(|d| d.id.clone())
            .collect()
    }

    /// Highest-priority domain matching `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.domains
            .iter()
            .find(|d| d.pattern.is_match(text))
            .map(|d| d.id.as_str())
    }

    /// Domains matched by the prompt or by the last `window` user/assistant
    /// messages.
    pub fn match_prompt(
        &self,
        prompt: &str,
        recent: &[TranscriptMessage],
        window: usize,
    ) -> Vec<String> {
        let recent_texts: Vec<&str> = recent
            .iter()
            .filter(|m| m.is_conversational())
            .rev()
            .take(window)
            .map(|m| m.text.as_str())
            .collect();

        self.domains
            .iter()
            .filter(|d| {
                d.pattern.is_match(prompt) || recent_texts.iter().any(|t| d.pattern.is_match(t))
            })
            .map(|d| d.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::KnowledgeError;
    use assert_matches::assert_matches;
    use sage_settings::default_domains;

    fn table(domains: &[(&str, &[&str])]) -> DomainMatcher {
        let settings: Vec<DomainSettings> = domains
            .iter()
            .map(|(id, kws)| DomainSettings::new(*id, kws))
            .collect();
        DomainMatcher::new(&settings).unwrap()
    }

    #[test]
    fn render_scenario() {
        let m = table(&[("render", &["render", "manim"])]);
        assert_eq!(m.match_text("Let's render the scene"), vec!["render"]);
    }

    #[test]
    fn word_start_matching() {
        let m = table(&[("render", &["render"]), ("ui", &["ui"])]);
        assert_eq!(m.match_text("Rendering now"), vec!["render"]);
        assert!(m.match_text("build the prerender cache").is_empty());
        assert!(m.match_text("build it").is_empty());
        assert_eq!(m.match_text("UI polish"), vec!["ui"]);
    }

    #[test]
    fn no_overlap_is_empty() {
        let m = table(&[("render", &["render", "manim"]), ("maps", &["geocode"])]);
        assert!(m.match_text("write a haiku about spring").is_empty());
        assert!(m.match_prompt("hello", &[], 3).is_empty());
    }

    #[test]
    fn union_in_priority_order() {
        let m = table(&[
            ("render", &["render"]),
            ("sharing", &["discord"]),
            ("notion", &["notion"]),
        ]);
        assert_eq!(
            m.match_text("post to discord after you render"),
            vec!["render", "sharing"]
        );
        assert_eq!(m.first_match("notion then discord"), Some("sharing"));
    }

    #[test]
    fn multi_word_keywords_tolerate_whitespace() {
        let m = table(&[("notion", &["markdown table"])]);
        assert_eq!(m.match_text("a Markdown\n  table"), vec!["notion"]);
        assert!(m.match_text("markdown only").is_empty());
    }

    #[test]
    fn keywords_are_literal() {
        let m = table(&[("render", &["c++", ".venv"])]);
        assert_eq!(m.match_text("compile the C++ code"), vec!["render"]);
        assert_eq!(m.match_text("activate .venv first"), vec!["render"]);
        assert!(m.match_text("cxx").is_empty());
    }

    #[test]
    fn recent_messages_window() {
        let m = table(&[("maps", &["geocode"]), ("render", &["manim"])]);
        let recent = vec![
            TranscriptMessage::user("geocode the address"),
            TranscriptMessage::tool("manim output"),
            TranscriptMessage::assistant("done"),
            TranscriptMessage::user("ok"),
            TranscriptMessage::assistant("next?"),
        ];
        assert!(m.match_prompt("continue", &recent, 3).is_empty());
        assert_eq!(m.match_prompt("continue", &recent, 4), vec!["maps"]);
    }

    #[test]
    fn invalid_table_is_config_error() {
        let bad = vec![DomainSettings::new("render", &[])];
        assert_matches!(DomainMatcher::new(&bad), Err(KnowledgeError::Config(_)));
    }

    #[test]
    fn default_table_compiles() {
        let m = DomainMatcher::new(&default_domains()).unwrap();
        assert!(!m.is_empty());
        assert_eq!(m.first_match("Geocode this place id"), Some("maps"));
    }
}
