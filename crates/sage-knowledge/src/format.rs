//! Per-domain markdown knowledge files.
//!
//! ```text
//! # Knowledge: render
//!
//! ## Entry 01929c1e-...
//! - **Context:** rendering a manim scene
//! - **Surprise:** system python lacks manim
//! - **Rule/Workaround:** use .venv/bin/python
//! - **Citations:** 3
//! - **Created:** 2026-10-01T12:00:00.000Z
//! - **Updated:** 2026-10-09T08:30:00.000Z
//! - **Source:** agent:main:subagent:abc
//! - **Previously:**
//!   - 2026-10-09T08:30:00.000Z | rule | agent:main:subagent:def | old text
//! ```
//!
//! Field values are single-line; embedded newlines are folded to spaces on
//! write. A malformed entry is reported and skipped, the rest of the file
//! still loads.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use sage_core::EntryId;

use crate::errors::KnowledgeError;
use crate::types::{EntryField, KnowledgeEntry, ProvenanceRecord};

const ENTRY_PREFIX: &str = "## Entry ";
const TITLE_PREFIX: &str = "# Knowledge: ";

/// Format a timestamp the way knowledge files store it.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render a whole domain file.
pub fn render_domain(domain: &str, entries: &[KnowledgeEntry]) -> String {
    let mut out = format!("{TITLE_PREFIX}{domain}\n");
    for entry in entries {
        out.push('\n');
        render_entry(&mut out, entry);
    }
    out
}

fn render_entry(out: &mut String, entry: &KnowledgeEntry) {
    let _ = writeln!(out, "{ENTRY_PREFIX}{}", entry.id);
    let _ = writeln!(out, "- **Context:** {}", single_line(&entry.context));
    let _ = writeln!(out, "- **Surprise:** {}", single_line(&entry.surprise));
    let _ = writeln!(out, "- **Rule/Workaround:** {}", single_line(&entry.rule));
    let _ = writeln!(out, "- **Citations:** {}", entry.citations);
    let _ = writeln!(out, "- **Created:** {}", format_timestamp(entry.created_at));
    let _ = writeln!(out, "- **Updated:** {}", format_timestamp(entry.updated_at));
    let _ = writeln!(out, "- **Source:** {}", single_line(&entry.source_ref));
    if !entry.provenance.is_empty() {
        out.push_str("- **Previously:**\n");
        for record in &entry.provenance {
            let _ = writeln!(
                out,
                "  - {} | {} | {} | {}",
                format_timestamp(record.recorded_at),
                record.field,
                single_line(&record.source_ref),
                single_line(&record.value)
            );
        }
    }
}

/// Read the domain id from a file's title line, if present.
pub fn parse_title(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.trim_end().strip_prefix(TITLE_PREFIX))
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[derive(Default)]
struct EntryDraft {
    line: usize,
    id: String,
    context: String,
    surprise: String,
    rule: String,
    citations: Option<String>,
    created: Option<String>,
    updated: Option<String>,
    source: String,
    provenance: Vec<(usize, String)>,
}

impl EntryDraft {
    fn finish(self, domain: &str) -> Result<KnowledgeEntry, KnowledgeError> {
        let err = |line: usize, message: String| KnowledgeError::Parse { line, message };

        if self.id.is_empty() {
            return Err(err(self.line, "entry header has no id".into()));
        }
        let created = self
            .created
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| err(self.line, format!("entry {} has a missing or bad Created", self.id)))?;
        let updated = match self.updated.as_deref() {
            None => created,
            Some(s) => parse_timestamp(s)
                .ok_or_else(|| err(self.line, format!("entry {} has a bad Updated", self.id)))?,
        };
        let citations = match self.citations.as_deref() {
            None => 1,
            Some(s) => s
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| err(self.line, format!("entry {} has bad Citations '{s}'", self.id)))?,
        };

        let mut provenance = Vec::with_capacity(self.provenance.len());
        for (line, raw) in self.provenance {
            provenance.push(parse_provenance(&raw).ok_or_else(|| {
                err(line, format!("malformed provenance line '{raw}'"))
            })?);
        }

        Ok(KnowledgeEntry {
            id: EntryId::from(self.id),
            domain: domain.to_string(),
            context: self.context,
            surprise: self.surprise,
            rule: self.rule,
            citations,
            created_at: created,
            updated_at: updated.max(created),
            source_ref: self.source,
            provenance,
        })
    }
}

fn parse_provenance(raw: &str) -> Option<ProvenanceRecord> {
    let mut parts = raw.splitn(4, " | ");
    let recorded_at = parse_timestamp(parts.next()?)?;
    let field = EntryField::parse(parts.next()?)?;
    let source_ref = parts.next()?.trim().to_string();
    let value = parts.next().unwrap_or_default().trim().to_string();
    Some(ProvenanceRecord {
        field,
        value,
        recorded_at,
        source_ref,
    })
}

fn field_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix("- **")?
        .strip_prefix(label)?
        .strip_prefix(":**")
        .map(str::trim)
}

/// Parse the entries of a domain file.
///
/// Returns every well-formed entry plus one error per skipped entry.
pub fn parse_domain(domain: &str, content: &str) -> (Vec<KnowledgeEntry>, Vec<KnowledgeError>) {
    let mut entries = Vec::new();
    let mut errors = Vec::new();
    let mut draft: Option<EntryDraft> = None;
    let mut in_provenance = false;

    let mut flush = |draft: Option<EntryDraft>, entries: &mut Vec<KnowledgeEntry>| {
        if let Some(d) = draft {
            match d.finish(domain) {
                Ok(entry) => entries.push(entry),
                Err(e) => errors.push(e),
            }
        }
    };

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end();

        if let Some(id) = line.strip_prefix(ENTRY_PREFIX) {
            flush(draft.take(), &mut entries);
            draft = Some(EntryDraft {
                line: line_no,
                id: id.trim().to_string(),
                ..EntryDraft::default()
            });
            in_provenance = false;
            continue;
        }

        let Some(d) = draft.as_mut() else {
            continue;
        };

        if in_provenance {
            if let Some(rest) = line.strip_prefix("  - ") {
                d.provenance.push((line_no, rest.to_string()));
                continue;
            }
            in_provenance = false;
        }

        if let Some(v) = field_value(line, "Context") {
            d.context = v.to_string();
        } else if let Some(v) = field_value(line, "Surprise") {
            d.surprise = v.to_string();
        } else if let Some(v) =
            field_value(line, "Rule/Workaround").or_else(|| field_value(line, "Rule"))
        {
            d.rule = v.to_string();
        } else if let Some(v) = field_value(line, "Citations") {
            d.citations = Some(v.to_string());
        } else if let Some(v) = field_value(line, "Created") {
            d.created = Some(v.to_string());
        } else if let Some(v) = field_value(line, "Updated") {
            d.updated = Some(v.to_string());
        } else if let Some(v) = field_value(line, "Source") {
            d.source = v.to_string();
        } else if field_value(line, "Previously").is_some() {
            in_provenance = true;
        }
    }
    flush(draft.take(), &mut entries);

    (entries, errors)
}
