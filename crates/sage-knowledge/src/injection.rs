//! Budgeted composition of the prepended knowledge context.
//!
//! Sections are admitted in domain-table priority order, semantic hits last.
//! The first section is always admitted, truncated to the budget if needed.
//! A later section is truncated to the remaining budget, or dropped when the
//! remainder is below `min_section_chars`. Truncation keeps whole entries
//! where it can and hard-cuts the first entry only when nothing else fits.

use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use sage_settings::InjectionSettings;

use crate::types::KnowledgeEntry;

const ELLIPSIS: char = '…';

/// Knobs for [`compose`].
#[derive(Clone, Debug)]
pub struct ComposeOptions {
    /// Maximum characters of injected text.
    pub char_budget: usize,
    /// Smallest useful excerpt for a non-first section.
    pub min_section_chars: usize,
    /// Age after which an entry gets a staleness caveat.
    pub stale_after_days: i64,
    /// Entries rendered per domain section.
    pub max_entries_per_domain: usize,
    /// Reference time for staleness.
    pub now: DateTime<Utc>,
}

impl ComposeOptions {
    /// Options from injection settings, evaluated at `now`.
    pub fn from_settings(settings: &InjectionSettings, now: DateTime<Utc>) -> Self {
        Self {
            char_budget: settings.char_budget,
            min_section_chars: settings.min_section_chars,
            stale_after_days: settings.stale_after_days,
            max_entries_per_domain: settings.max_entries_per_domain,
            now,
        }
    }
}

/// Render one entry as a bullet block.
pub fn render_entry(entry: &KnowledgeEntry, opts: &ComposeOptions) -> String {
    let mut out = String::new();
    let headline = if entry.rule.is_empty() {
        &entry.surprise
    } else {
        &entry.rule
    };
    let _ = write!(out, "- {headline}");
    if entry.citations > 1 {
        let _ = write!(out, " (seen {}x)", entry.citations);
    }
    out.push('\n');
    if !entry.context.is_empty() {
        let _ = writeln!(out, "  When: {}", entry.context);
    }
    if !entry.rule.is_empty() && !entry.surprise.is_empty() {
        let _ = writeln!(out, "  Why: {}", entry.surprise);
    }
    let age = entry.age_days(opts.now);
    if age > opts.stale_after_days {
        let _ = writeln!(
            out,
            "  (last confirmed {age} days ago; verify before relying on it)"
        );
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn hard_cut(s: &str, limit: usize) -> String {
    if char_len(s) <= limit {
        return s.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(limit - 1).collect();
    out.push(ELLIPSIS);
    out
}

/// Build a section from a title and entry blocks, fitting `limit` chars.
fn fit_section(title: &str, blocks: &[String], limit: usize) -> Option<String> {
    let mut out = format!("{title}\n");
    if char_len(&out) >= limit || blocks.is_empty() {
        return None;
    }
    let mut used = char_len(&out);
    let mut admitted = 0;
    for block in blocks {
        let len = char_len(block);
        if used + len > limit {
            continue;
        }
        out.push_str(block);
        used += len;
        admitted += 1;
    }
    if admitted == 0 {
        out.push_str(&hard_cut(&blocks[0], limit - used));
    }
    Some(out)
}

fn ranked(entries: &[KnowledgeEntry], max: usize) -> Vec<&KnowledgeEntry> {
    let mut sorted: Vec<&KnowledgeEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        b.citations
            .cmp(&a.citations)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
    sorted.truncate(max.max(1));
    sorted
}

/// Compose the prepended context.
///
/// `domain_sections` are `(domainId, entries)` in priority order; `semantic`
/// is the retriever's output. Returns `None` when nothing is worth injecting.
/// The result never exceeds `opts.char_budget` characters.
pub fn compose(
    domain_sections: &[(String, Vec<KnowledgeEntry>)],
    semantic: &[KnowledgeEntry],
    opts: &ComposeOptions,
) -> Option<String> {
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();
    let mut seen = HashSet::new();

    for (domain, entries) in domain_sections {
        let chosen = ranked(entries, opts.max_entries_per_domain);
        if chosen.is_empty() {
            continue;
        }
        for e in &chosen {
            let _ = seen.insert(e.id.as_str());
        }
        let blocks = chosen.iter().map(|e| render_entry(e, opts)).collect();
        sections.push((format!("### Known pitfalls: {domain}"), blocks));
    }

    let related: Vec<String> = semantic
        .iter()
        .filter(|e| seen.insert(e.id.as_str()))
        .map(|e| render_entry(e, opts))
        .collect();
    if !related.is_empty() {
        sections.push(("### Related lessons".to_string(), related));
    }

    let mut out = String::new();
    for (i, (title, blocks)) in sections.iter().enumerate() {
        let separator = usize::from(!out.is_empty());
        let remaining = opts
            .char_budget
            .saturating_sub(char_len(&out) + separator);
        if i > 0 && remaining < opts.min_section_chars {
            break;
        }
        let Some(section) = fit_section(title, blocks, remaining) else {
            continue;
        };
        if separator == 1 {
            out.push('\n');
        }
        out.push_str(&section);
    }

    let trimmed = out.trim_end();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
