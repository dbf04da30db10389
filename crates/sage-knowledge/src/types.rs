//! Knowledge entry, provenance, and candidate types.

use std::fmt;

use chrono::{DateTime, Utc};
use sage_core::EntryId;
use serde::{Deserialize, Serialize};

/// One of the three superseded-able text fields of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryField {
    /// Situation in which the lesson applies.
    Context,
    /// What went unexpectedly.
    Surprise,
    /// Rule or workaround to apply next time.
    Rule,
}

impl EntryField {
    /// All fields in rendering order.
    pub const ALL: [Self; 3] = [Self::Context, Self::Surprise, Self::Rule];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Surprise => "surprise",
            Self::Rule => "rule",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "context" => Some(Self::Context),
            "surprise" => Some(Self::Surprise),
            "rule" => Some(Self::Rule),
            _ => None,
        }
    }
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that is no longer (or never was) current for a field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRecord {
    /// Which field the value belonged to.
    pub field: EntryField,
    /// The retained text.
    pub value: String,
    /// When the value was superseded or out-voted.
    pub recorded_at: DateTime<Utc>,
    /// Session that produced the value.
    pub source_ref: String,
}

/// A curated, deduplicated fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntry {
    /// Immutable identity.
    pub id: EntryId,
    /// Owning domain.
    pub domain: String,
    /// Situation in which the lesson applies.
    pub context: String,
    /// What went unexpectedly.
    pub surprise: String,
    /// Rule or workaround.
    pub rule: String,
    /// How many times the fact has been observed (at least 1).
    pub citations: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time the current values were last confirmed.
    pub updated_at: DateTime<Utc>,
    /// Session that produced the current values.
    pub source_ref: String,
    /// Superseded and out-voted values, oldest first.
    #[serde(default)]
    pub provenance: Vec<ProvenanceRecord>,
}

impl KnowledgeEntry {
    /// Create a fresh entry from a candidate.
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            id: EntryId::new(),
            domain: candidate.domain.clone(),
            context: candidate.context.clone(),
            surprise: candidate.surprise.clone(),
            rule: candidate.rule.clone(),
            citations: 1,
            created_at: candidate.observed_at,
            updated_at: candidate.observed_at,
            source_ref: candidate.source_ref.clone(),
            provenance: Vec::new(),
        }
    }

    /// Current value of a field.
    pub fn field(&self, field: EntryField) -> &str {
        match field {
            EntryField::Context => &self.context,
            EntryField::Surprise => &self.surprise,
            EntryField::Rule => &self.rule,
        }
    }

    /// Mutable access to a field.
    pub fn field_mut(&mut self, field: EntryField) -> &mut String {
        match field {
            EntryField::Context => &mut self.context,
            EntryField::Surprise => &mut self.surprise,
            EntryField::Rule => &mut self.rule,
        }
    }

    /// Text that is embedded for deduplication and retrieval.
    pub fn embedding_text(&self) -> String {
        compose_text(&self.context, &self.surprise, &self.rule)
    }

    /// Whole days since the entry was last confirmed.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_days()
    }
}

/// An unmerged fact headed for the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Target domain.
    pub domain: String,
    /// Situation in which the lesson applies.
    #[serde(default)]
    pub context: String,
    /// What went unexpectedly.
    #[serde(default)]
    pub surprise: String,
    /// Rule or workaround.
    #[serde(default)]
    pub rule: String,
    /// Producing session.
    #[serde(default)]
    pub source_ref: String,
    /// Observation time used for newest-wins merging.
    pub observed_at: DateTime<Utc>,
}

impl Candidate {
    /// Create a candidate observed now.
    pub fn new(
        domain: impl Into<String>,
        context: impl Into<String>,
        surprise: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            context: context.into(),
            surprise: surprise.into(),
            rule: rule.into(),
            source_ref: String::new(),
            observed_at: Utc::now(),
        }
    }

    /// Set the producing session.
    #[must_use]
    pub fn with_source(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = source_ref.into();
        self
    }

    /// Set the observation time.
    #[must_use]
    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    /// Value of a field.
    pub fn field(&self, field: EntryField) -> &str {
        match field {
            EntryField::Context => &self.context,
            EntryField::Surprise => &self.surprise,
            EntryField::Rule => &self.rule,
        }
    }

    /// Whether every text field is blank.
    pub fn is_blank(&self) -> bool {
        EntryField::ALL.iter().all(|f| self.field(*f).trim().is_empty())
    }

    /// Text that is embedded for deduplication.
    pub fn embedding_text(&self) -> String {
        compose_text(&self.context, &self.surprise, &self.rule)
    }
}

/// What a store write did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new entry was created.
    Inserted(EntryId),
    /// The candidate merged into an existing entry.
    Merged {
        /// The existing entry.
        id: EntryId,
        /// Citation count after the merge.
        citations: u32,
    },
}

impl WriteOutcome {
    /// ID of the entry that now holds the fact.
    pub fn id(&self) -> &EntryId {
        match self {
            Self::Inserted(id) | Self::Merged { id, .. } => id,
        }
    }
}

/// Join non-empty fields with newlines.
pub fn compose_text(context: &str, surprise: &str, rule: &str) -> String {
    [context, surprise, rule]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lowercase, collapse whitespace, and strip punctuation for exact comparison.
pub fn normalize_text(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
