//! Settings validation.
//!
//! Runs after merging so that a bad value from any layer is caught. The
//! domain table and rewrite-rule table are validated strictly: one bad row
//! rejects the whole configuration.

use std::collections::HashSet;

use regex::Regex;

use crate::errors::{Result, SettingsError};
use crate::types::{DomainSettings, RewriteRuleSettings, SageSettings};

/// Whether `id` is a valid domain identifier (`[a-z0-9_-]+`).
pub fn is_valid_domain_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate merged settings.
pub fn validate(settings: &SageSettings) -> Result<()> {
    validate_domains(&settings.domains)?;
    validate_rewrite_rules(&settings.rewrite_rules)?;

    if !is_valid_domain_id(&settings.extraction.fallback_domain) {
        return Err(SettingsError::InvalidValue(format!(
            "extraction.fallbackDomain '{}' is not a valid domain id",
            settings.extraction.fallback_domain
        )));
    }
    check_unit_interval("knowledge.dedupThreshold", settings.knowledge.dedup_threshold)?;
    check_unit_interval("retrieval.threshold", settings.retrieval.threshold)?;
    if settings.retrieval.top_k == 0 {
        return Err(SettingsError::InvalidValue(
            "retrieval.topK must be at least 1".into(),
        ));
    }
    if settings.retrieval.timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "retrieval.timeoutMs must be positive".into(),
        ));
    }
    if settings.injection.char_budget < settings.injection.min_section_chars {
        return Err(SettingsError::InvalidValue(format!(
            "injection.charBudget ({}) is smaller than injection.minSectionChars ({})",
            settings.injection.char_budget, settings.injection.min_section_chars
        )));
    }
    if settings.embedding.dimensions == 0 {
        return Err(SettingsError::InvalidValue(
            "embedding.dimensions must be positive".into(),
        ));
    }
    Ok(())
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

/// Validate the domain table.
pub fn validate_domains(domains: &[DomainSettings]) -> Result<()> {
    let mut ids = HashSet::new();
    let mut files = HashSet::new();

    for domain in domains {
        if !is_valid_domain_id(&domain.id) {
            return Err(SettingsError::InvalidDomainTable(format!(
                "domain id '{}' must match [a-z0-9_-]+",
                domain.id
            )));
        }
        if !ids.insert(domain.id.as_str()) {
            return Err(SettingsError::InvalidDomainTable(format!(
                "duplicate domain id '{}'",
                domain.id
            )));
        }
        if domain.keywords.is_empty() {
            return Err(SettingsError::InvalidDomainTable(format!(
                "domain '{}' has no keywords",
                domain.id
            )));
        }
        if domain.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(SettingsError::InvalidDomainTable(format!(
                "domain '{}' has a blank keyword",
                domain.id
            )));
        }
        let file = domain.curated_file();
        if file.contains('/') || file.contains('\\') || file.starts_with('.') {
            return Err(SettingsError::InvalidDomainTable(format!(
                "domain '{}' file '{file}' must be a plain file name",
                domain.id
            )));
        }
        if !files.insert(file.clone()) {
            return Err(SettingsError::InvalidDomainTable(format!(
                "domain '{}' shares file '{file}' with another domain",
                domain.id
            )));
        }
    }
    Ok(())
}

/// Validate the rewrite-rule table.
pub fn validate_rewrite_rules(rules: &[RewriteRuleSettings]) -> Result<()> {
    let mut ids = HashSet::new();

    for rule in rules {
        let invalid = |message: String| SettingsError::InvalidRewriteRule {
            id: rule.id.clone(),
            message,
        };

        if rule.id.trim().is_empty() {
            return Err(invalid("rule id is empty".into()));
        }
        if !ids.insert(rule.id.as_str()) {
            return Err(invalid("duplicate rule id".into()));
        }
        if rule.pattern.is_empty() {
            return Err(invalid("empty match pattern".into()));
        }
        if rule.target.trim().is_empty() {
            return Err(invalid("empty target parameter".into()));
        }
        if rule.regex {
            if let Err(e) = Regex::new(&rule.pattern) {
                return Err(invalid(format!("invalid regex: {e}")));
            }
        }
        if !rule.has_effect() {
            return Err(invalid(
                "rule needs a replacement, env injections, or a block reason".into(),
            ));
        }
        if let Some(name) = rule.env.keys().find(|k| !is_valid_env_name(k)) {
            return Err(invalid(format!("invalid environment variable name '{name}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn domain_id_charset() {
        assert!(is_valid_domain_id("render"));
        assert!(is_valid_domain_id("google_maps-2"));
        assert!(!is_valid_domain_id(""));
        assert!(!is_valid_domain_id("Render"));
        assert!(!is_valid_domain_id("../etc"));
        assert!(!is_valid_domain_id("a b"));
    }

    #[test]
    fn env_name_charset() {
        assert!(is_valid_env_name("PYTHONUNBUFFERED"));
        assert!(is_valid_env_name("_X1"));
        assert!(!is_valid_env_name("1X"));
        assert!(!is_valid_env_name("A-B"));
        assert!(!is_valid_env_name(""));
    }

    #[test]
    fn duplicate_domain_rejected() {
        let domains = vec![
            DomainSettings::new("render", &["render"]),
            DomainSettings::new("render", &["manim"]),
        ];
        assert_matches!(
            validate_domains(&domains),
            Err(SettingsError::InvalidDomainTable(msg)) if msg.contains("duplicate")
        );
    }

    #[test]
    fn domain_without_keywords_rejected() {
        let domains = vec![DomainSettings::new("render", &[])];
        assert_matches!(
            validate_domains(&domains),
            Err(SettingsError::InvalidDomainTable(_))
        );
    }

    #[test]
    fn blank_keyword_rejected() {
        let domains = vec![DomainSettings::new("render", &["render", "  "])];
        assert!(validate_domains(&domains).is_err());
    }

    #[test]
    fn path_like_file_rejected() {
        let domains = vec![DomainSettings {
            file: Some("../escape.md".into()),
            ..DomainSettings::new("render", &["render"])
        }];
        assert!(validate_domains(&domains).is_err());
    }

    #[test]
    fn shared_file_rejected() {
        let domains = vec![
            DomainSettings::new("render", &["render"]),
            DomainSettings {
                file: Some("render.md".into()),
                ..DomainSettings::new("video", &["video"])
            },
        ];
        assert!(validate_domains(&domains).is_err());
    }

    #[test]
    fn invalid_regex_rejected() {
        let rule = RewriteRuleSettings {
            regex: true,
            ..RewriteRuleSettings::replace("bad", "([unclosed", "x")
        };
        assert_matches!(
            validate_rewrite_rules(&[rule]),
            Err(SettingsError::InvalidRewriteRule { id, message }) if id == "bad" && message.contains("regex")
        );
    }

    #[test]
    fn literal_pattern_with_regex_chars_ok() {
        let rule = RewriteRuleSettings::replace("lit", "([unclosed", "x");
        validate_rewrite_rules(&[rule]).unwrap();
    }

    #[test]
    fn rule_without_effect_rejected() {
        let rule = RewriteRuleSettings {
            replacement: None,
            ..RewriteRuleSettings::replace("noop", "a", "b")
        };
        assert!(validate_rewrite_rules(&[rule]).is_err());
    }

    #[test]
    fn duplicate_rule_rejected() {
        let rules = vec![
            RewriteRuleSettings::replace("r", "a", "b"),
            RewriteRuleSettings::replace("r", "c", "d"),
        ];
        assert!(validate_rewrite_rules(&rules).is_err());
    }

    #[test]
    fn bad_env_name_rejected() {
        let mut rule = RewriteRuleSettings::replace("r", "a", "b");
        let _ = rule.env.insert("NOT-VALID".into(), "1".into());
        assert!(validate_rewrite_rules(&[rule]).is_err());
    }

    #[test]
    fn thresholds_must_be_in_unit_interval() {
        let mut settings = SageSettings::default();
        settings.retrieval.threshold = 0.0;
        assert_matches!(validate(&settings), Err(SettingsError::InvalidValue(_)));

        let mut settings = SageSettings::default();
        settings.knowledge.dedup_threshold = 1.5;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn zero_top_k_rejected() {
        let mut settings = SageSettings::default();
        settings.retrieval.top_k = 0;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn bad_fallback_domain_rejected() {
        let mut settings = SageSettings::default();
        settings.extraction.fallback_domain = "Not Valid".into();
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn budget_below_min_section_rejected() {
        let mut settings = SageSettings::default();
        settings.injection.char_budget = 50;
        assert!(validate(&settings).is_err());
    }
}
