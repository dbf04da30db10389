//! Curated knowledge store.
//!
//! One markdown file per domain (see [`crate::format`]) plus one vector per
//! entry in the shared index. Writes to a domain are serialized by a
//! per-domain async mutex within the process and by an exclusive `flock` on
//! `<dir>/.<domain>.lock` across processes. Reads take no lock and rely on
//! atomic rename.
//!
//! Merge semantics for a near-duplicate candidate:
//! - `citations` is incremented
//! - each differing non-empty text field is resolved newest-wins on
//!   `observedAt` vs `updatedAt`; the losing value goes to provenance
//! - `updatedAt` becomes the later of the two timestamps

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sage_embeddings::normalize::cosine_similarity;
use sage_embeddings::{Embedding, EmbeddingProvider, SharedVectorRepository, embed_with_timeout};
use sage_settings::validate::is_valid_domain_id;
use sage_settings::{DomainSettings, SageSettings, expand_home};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{KnowledgeError, Result};
use crate::format::{parse_domain, parse_title, render_domain};
use crate::types::{
    Candidate, EntryField, KnowledgeEntry, ProvenanceRecord, WriteOutcome, normalize_text,
};

/// Exclusive advisory lock on a domain's lock file, released on drop.
struct DomainFileLock {
    _file: std::fs::File,
}

impl DomainFileLock {
    /// Block (off the async workers) until no other process holds the lock.
    async fn acquire(dir: &Path, path: PathBuf) -> Result<Self> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<Self> {
            std::fs::create_dir_all(&dir)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            rustix::fs::flock(&file, rustix::fs::FlockOperation::LockExclusive)
                .map_err(std::io::Error::from)?;
            Ok(Self { _file: file })
        })
        .await
        .map_err(|e| KnowledgeError::Io(std::io::Error::other(e)))?
    }
}

/// Storage seam for curated knowledge.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Merge a candidate into its domain, returning where it landed.
    async fn write(&self, candidate: Candidate) -> Result<WriteOutcome>;

    /// All entries of a domain in file order. Unknown domains are empty.
    async fn read(&self, domain: &str) -> Result<Vec<KnowledgeEntry>>;

    /// A single entry.
    async fn get(&self, domain: &str, entry_id: &str) -> Result<Option<KnowledgeEntry>> {
        Ok(self
            .read(domain)
            .await?
            .into_iter()
            .find(|e| e.id.as_str() == entry_id))
    }

    /// Domains that currently have a knowledge file.
    async fn domains(&self) -> Result<Vec<String>>;
}

/// File-backed [`KnowledgeStore`] with embedding-based deduplication.
pub struct CuratedKnowledgeStore {
    dir: PathBuf,
    files: HashMap<String, String>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    vectors: Option<SharedVectorRepository>,
    dedup_threshold: f32,
    embed_timeout_ms: u64,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CuratedKnowledgeStore {
    /// Store rooted at `dir` with exact-text deduplication only.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: HashMap::new(),
            provider: None,
            vectors: None,
            dedup_threshold: 0.85,
            embed_timeout_ms: 500,
            locks: DashMap::new(),
        }
    }

    /// Build from settings with the given provider and vector index.
    pub fn from_settings(
        settings: &SageSettings,
        provider: Arc<dyn EmbeddingProvider>,
        vectors: SharedVectorRepository,
    ) -> Self {
        Self::new(expand_home(&settings.knowledge.dir))
            .with_domain_files(&settings.domains)
            .with_embeddings(provider, vectors)
            .with_dedup_threshold(settings.knowledge.dedup_threshold)
            .with_embed_timeout_ms(settings.retrieval.timeout_ms)
    }

    /// Enable embedding-based deduplication and vector upserts.
    #[must_use]
    pub fn with_embeddings(
        mut self,
        provider: Arc<dyn EmbeddingProvider>,
        vectors: SharedVectorRepository,
    ) -> Self {
        self.provider = Some(provider);
        self.vectors = Some(vectors);
        self
    }

    /// Use the curated file names of a domain table.
    #[must_use]
    pub fn with_domain_files(mut self, domains: &[DomainSettings]) -> Self {
        self.files = domains
            .iter()
            .map(|d| (d.id.clone(), d.curated_file()))
            .collect();
        self
    }

    /// Similarity at or above which a candidate merges.
    #[must_use]
    pub fn with_dedup_threshold(mut self, threshold: f32) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    /// Deadline for embedding a candidate.
    #[must_use]
    pub fn with_embed_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.embed_timeout_ms = timeout_ms;
        self
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, domain: &str) -> PathBuf {
        let file = self
            .files
            .get(domain)
            .cloned()
            .unwrap_or_else(|| format!("{domain}.md"));
        self.dir.join(file)
    }

    fn lock_for(&self, domain: &str) -> Arc<Mutex<()>> {
        self.locks.entry(domain.to_string()).or_default().clone()
    }

    fn lock_path(&self, domain: &str) -> PathBuf {
        self.dir.join(format!(".{domain}.lock"))
    }

    fn load(&self, domain: &str) -> Result<Vec<KnowledgeEntry>> {
        let path = self.path_for(domain);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let (entries, errors) = parse_domain(domain, &content);
        for error in errors {
            warn!(domain, path = %path.display(), %error, "skipping malformed knowledge entry");
        }
        Ok(entries)
    }

    fn persist(&self, domain: &str, entries: &[KnowledgeEntry]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(domain);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        std::io::Write::write_all(&mut tmp, render_domain(domain, entries).as_bytes())?;
        tmp.as_file().sync_all()?;
        let _ = tmp.persist(&path).map_err(|e| KnowledgeError::Persist {
            path: path.display().to_string(),
            message: e.error.to_string(),
        })?;
        Ok(())
    }

    async fn embed_candidate(&self, text: &str) -> Option<Embedding> {
        let provider = self.provider.as_ref()?;
        match embed_with_timeout(provider.as_ref(), text, self.embed_timeout_ms).await {
            Ok(embedding) => Some(embedding),
            Err(error) => {
                warn!(%error, "candidate embedding failed, falling back to exact-text dedup");
                None
            }
        }
    }

    /// Index of the stored entry the candidate duplicates, and whether it
    /// was found by exact text rather than by vector.
    fn find_duplicate(
        &self,
        domain: &str,
        entries: &[KnowledgeEntry],
        candidate_text: &str,
        embedding: Option<&Embedding>,
    ) -> Option<(usize, bool)> {
        if let (Some(embedding), Some(vectors)) = (embedding, &self.vectors) {
            let stored = match vectors.lock().vectors_for_domain(domain, &embedding.model_id) {
                Ok(stored) => stored,
                Err(error) => {
                    warn!(domain, %error, "vector lookup failed during dedup");
                    Vec::new()
                }
            };
            let best = stored
                .iter()
                .filter_map(|(id, vector)| {
                    let idx = entries.iter().position(|e| e.id.as_str() == id)?;
                    Some((idx, cosine_similarity(&embedding.vector, vector)))
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            if let Some((idx, similarity)) = best {
                debug!(domain, similarity, "closest stored entry");
                if similarity >= self.dedup_threshold {
                    return Some((idx, false));
                }
            }
        }

        let wanted = normalize_text(candidate_text);
        entries
            .iter()
            .position(|e| normalize_text(&e.embedding_text()) == wanted)
            .map(|idx| (idx, true))
    }

    fn upsert_vector(&self, entry: &KnowledgeEntry, embedding: &Embedding) {
        let Some(vectors) = &self.vectors else {
            return;
        };
        if let Err(error) = vectors.lock().store(
            entry.id.as_str(),
            &embedding.model_id,
            &entry.domain,
            &embedding.vector,
        ) {
            warn!(entry_id = %entry.id, %error, "failed to upsert entry vector");
        }
    }
}

fn validate_candidate(candidate: &Candidate) -> Result<()> {
    if !is_valid_domain_id(&candidate.domain) {
        return Err(KnowledgeError::InvalidCandidate(format!(
            "domain '{}' must match [a-z0-9_-]+",
            candidate.domain
        )));
    }
    if candidate.is_blank() {
        return Err(KnowledgeError::InvalidCandidate(
            "context, surprise, and rule are all empty".into(),
        ));
    }
    Ok(())
}

fn trimmed(candidate: Candidate) -> Candidate {
    Candidate {
        context: candidate.context.trim().to_string(),
        surprise: candidate.surprise.trim().to_string(),
        rule: candidate.rule.trim().to_string(),
        ..candidate
    }
}

/// Fold a near-duplicate candidate into an existing entry.
pub fn merge_into(entry: &mut KnowledgeEntry, candidate: &Candidate) {
    entry.citations = entry.citations.saturating_add(1);
    let candidate_newer = candidate.observed_at >= entry.updated_at;

    for field in EntryField::ALL {
        let incoming = candidate.field(field);
        if incoming.is_empty() || incoming == entry.field(field) {
            continue;
        }
        if entry.field(field).is_empty() {
            *entry.field_mut(field) = incoming.to_string();
            continue;
        }
        if candidate_newer {
            let previous = std::mem::replace(entry.field_mut(field), incoming.to_string());
            entry.provenance.push(ProvenanceRecord {
                field,
                value: previous,
                recorded_at: candidate.observed_at,
                source_ref: entry.source_ref.clone(),
            });
        } else {
            entry.provenance.push(ProvenanceRecord {
                field,
                value: incoming.to_string(),
                recorded_at: candidate.observed_at,
                source_ref: candidate.source_ref.clone(),
            });
        }
    }

    if candidate_newer {
        entry.updated_at = candidate.observed_at;
        if !candidate.source_ref.is_empty() {
            entry.source_ref.clone_from(&candidate.source_ref);
        }
    }
}

#[async_trait]
impl KnowledgeStore for CuratedKnowledgeStore {
    async fn write(&self, candidate: Candidate) -> Result<WriteOutcome> {
        validate_candidate(&candidate)?;
        let candidate = trimmed(candidate);
        let text = candidate.embedding_text();
        let domain = candidate.domain.clone();

        // Embed before locking so a slow provider never blocks other writers.
        let embedding = self.embed_candidate(&text).await;

        let lock = self.lock_for(&domain);
        let _guard = lock.lock().await;
        let _file_lock = DomainFileLock::acquire(&self.dir, self.lock_path(&domain)).await?;

        let mut entries = self.load(&domain)?;
        let (outcome, idx, upsert) =
            match self.find_duplicate(&domain, &entries, &text, embedding.as_ref()) {
                Some((idx, by_text)) => {
                    let entry = &mut entries[idx];
                    merge_into(entry, &candidate);
                    // Replace the vector only when it now describes the candidate's text,
                    // or when the entry had none for this model.
                    let upsert = by_text || entry.embedding_text() == text;
                    let outcome = WriteOutcome::Merged {
                        id: entry.id.clone(),
                        citations: entry.citations,
                    };
                    (outcome, idx, upsert)
                }
                None => {
                    entries.push(KnowledgeEntry::from_candidate(&candidate));
                    let idx = entries.len() - 1;
                    (WriteOutcome::Inserted(entries[idx].id.clone()), idx, true)
                }
            };

        self.persist(&domain, &entries)?;
        if upsert {
            if let Some(embedding) = &embedding {
                self.upsert_vector(&entries[idx], embedding);
            }
        }

        match &outcome {
            WriteOutcome::Inserted(id) => info!(domain, entry_id = %id, "inserted knowledge entry"),
            WriteOutcome::Merged { id, citations } => {
                info!(domain, entry_id = %id, citations, "merged knowledge entry");
            }
        }
        Ok(outcome)
    }

    async fn read(&self, domain: &str) -> Result<Vec<KnowledgeEntry>> {
        if !is_valid_domain_id(domain) {
            return Ok(Vec::new());
        }
        self.load(domain)
    }

    async fn domains(&self) -> Result<Vec<String>> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let by_file: HashMap<&str, &str> = self
            .files
            .iter()
            .map(|(domain, file)| (file.as_str(), domain.as_str()))
            .collect();

        let mut domains = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            let domain = match by_file.get(file_name) {
                Some(domain) => (*domain).to_string(),
                None => std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|c| parse_title(&c))
                    .or_else(|| {
                        path.file_stem()
                            .and_then(|s| s.to_str())
                            .map(String::from)
                    })
                    .unwrap_or_default(),
            };
            if is_valid_domain_id(&domain) {
                domains.push(domain);
            }
        }
        domains.sort();
        domains.dedup();
        Ok(domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};
    use sage_embeddings::{HashingEmbeddingProvider, Result as EmbedResult, VectorRepository};

    fn hashing_store(dir: &Path) -> (CuratedKnowledgeStore, SharedVectorRepository) {
        let vectors = VectorRepository::in_memory().unwrap().shared();
        let store = CuratedKnowledgeStore::new(dir)
            .with_embeddings(Arc::new(HashingEmbeddingProvider::new(256)), vectors.clone());
        (store, vectors)
    }

    fn discord(limit: &str) -> Candidate {
        Candidate::new(
            "sharing",
            "Posting render previews to Discord via webhook",
            format!("Discord rate limit is {limit}"),
            "Throttle webhook posts",
        )
    }

    #[tokio::test]
    async fn insert_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let (store, vectors) = hashing_store(dir.path());
        let outcome = store.write(discord("50/min")).await.unwrap();
        assert_matches!(outcome, WriteOutcome::Inserted(_));

        let entries = store.read("sharing").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].citations, 1);
        assert_eq!(vectors.lock().count().unwrap(), 1);
        assert!(dir.path().join("sharing.md").exists());
    }

    #[tokio::test]
    async fn newer_duplicate_wins_and_keeps_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = hashing_store(dir.path());
        let now = Utc::now();

        let old = discord("50/min")
            .with_source("agent:main:subagent:old")
            .with_observed_at(now - Duration::days(10));
        let first = store.write(old).await.unwrap();
        let second = store
            .write(
                discord("100/min")
                    .with_source("agent:main:subagent:new")
                    .with_observed_at(now),
            )
            .await
            .unwrap();

        assert_matches!(second, WriteOutcome::Merged { citations: 2, .. });
        assert_eq!(first.id(), second.id());

        let entries = store.read("sharing").await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.surprise, "Discord rate limit is 100/min");
        assert_eq!(entry.source_ref, "agent:main:subagent:new");
        assert_eq!(entry.provenance.len(), 1);
        assert_eq!(entry.provenance[0].field, EntryField::Surprise);
        assert_eq!(entry.provenance[0].value, "Discord rate limit is 50/min");
        assert_eq!(entry.provenance[0].source_ref, "agent:main:subagent:old");
    }

    #[tokio::test]
    async fn older_duplicate_is_outvoted_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = hashing_store(dir.path());
        let now = Utc::now();

        let _ = store
            .write(discord("100/min").with_observed_at(now))
            .await
            .unwrap();
        let _ = store
            .write(
                discord("50/min")
                    .with_source("agent:main:subagent:late")
                    .with_observed_at(now - Duration::days(3)),
            )
            .await
            .unwrap();

        let entry = &store.read("sharing").await.unwrap()[0];
        assert_eq!(entry.surprise, "Discord rate limit is 100/min");
        assert_eq!(entry.citations, 2);
        assert_eq!(entry.updated_at.timestamp_millis(), now.timestamp_millis());
        assert_eq!(entry.provenance[0].value, "Discord rate limit is 50/min");
        assert_eq!(entry.provenance[0].source_ref, "agent:main:subagent:late");
    }

    #[tokio::test]
    async fn unrelated_candidates_are_separate_entries() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = hashing_store(dir.path());
        let _ = store.write(discord("50/min")).await.unwrap();
        let outcome = store
            .write(Candidate::new(
                "sharing",
                "Uploading a finished clip to Slack",
                "Slack rejects files above the workspace size cap",
                "Compress with ffmpeg before upload",
            ))
            .await
            .unwrap();
        assert_matches!(outcome, WriteOutcome::Inserted(_));
        assert_eq!(store.read("sharing").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_duplicates_leave_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = hashing_store(dir.path());
        let store = Arc::new(store);

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.write(discord("50/min")).await })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.write(discord("50/min")).await })
        };
        let _ = a.await.unwrap().unwrap();
        let _ = b.await.unwrap().unwrap();

        let entries = store.read("sharing").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].citations, 2);
    }

    fn slack() -> Candidate {
        Candidate::new(
            "sharing",
            "Uploading a finished clip to Slack",
            "Slack rejects files above the workspace size cap",
            "Compress with ffmpeg before upload",
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_stores_on_one_dir_keep_every_write() {
        for round in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let a = Arc::new(CuratedKnowledgeStore::new(dir.path()));
            let b = Arc::new(CuratedKnowledgeStore::new(dir.path()));

            let first = {
                let a = Arc::clone(&a);
                tokio::spawn(async move { a.write(discord("50/min")).await })
            };
            let second = {
                let b = Arc::clone(&b);
                tokio::spawn(async move { b.write(slack()).await })
            };
            assert_matches!(first.await.unwrap().unwrap(), WriteOutcome::Inserted(_));
            assert_matches!(second.await.unwrap().unwrap(), WriteOutcome::Inserted(_));

            assert_eq!(a.read("sharing").await.unwrap().len(), 2, "round {round}");
            assert!(dir.path().join(".sharing.lock").exists());
        }
    }

    async fn assert_conflict_resolved(store: &CuratedKnowledgeStore) {
        let entries = store.read("sharing").await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.citations, 2);
        assert_eq!(entry.surprise, "Discord rate limit is 100/min");
        assert_eq!(entry.provenance.len(), 1);
        assert_eq!(entry.provenance[0].field, EntryField::Surprise);
        assert_eq!(entry.provenance[0].value, "Discord rate limit is 50/min");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_conflicting_duplicates_merge_newest_wins() {
        let now = Utc::now();
        let older = move || discord("50/min").with_observed_at(now - Duration::minutes(1));
        let newer = move || discord("100/min").with_observed_at(now);

        let dir = tempfile::tempdir().unwrap();
        let (store, _) = hashing_store(dir.path());
        let store = Arc::new(store);
        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.write(older()).await })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.write(newer()).await })
        };
        let _ = a.await.unwrap().unwrap();
        let _ = b.await.unwrap().unwrap();
        assert_conflict_resolved(&store).await;

        // Two stores sharing one directory and vector index, as two hook
        // processes would.
        let dir = tempfile::tempdir().unwrap();
        let vectors = VectorRepository::in_memory().unwrap().shared();
        let open = || {
            Arc::new(CuratedKnowledgeStore::new(dir.path()).with_embeddings(
                Arc::new(HashingEmbeddingProvider::new(256)),
                vectors.clone(),
            ))
        };
        let (left, right) = (open(), open());
        let a = {
            let left = Arc::clone(&left);
            tokio::spawn(async move { left.write(newer()).await })
        };
        let b = tokio::spawn(async move { right.write(older()).await });
        let _ = a.await.unwrap().unwrap();
        let _ = b.await.unwrap().unwrap();
        assert_conflict_resolved(&left).await;
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_id(&self) -> &str {
            "down"
        }

        async fn embed(&self, _text: &str) -> EmbedResult<Embedding> {
            Err(sage_embeddings::EmbeddingError::Provider {
                status: 503,
                message: "down".into(),
            })
        }
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_exact_text() {
        let dir = tempfile::tempdir().unwrap();
        let vectors = VectorRepository::in_memory().unwrap().shared();
        let store = CuratedKnowledgeStore::new(dir.path())
            .with_embeddings(Arc::new(FailingProvider), vectors.clone());

        let _ = store.write(discord("50/min")).await.unwrap();
        let same = Candidate::new(
            "sharing",
            "posting render previews to discord via webhook.",
            "DISCORD rate limit is 50/min",
            "Throttle webhook posts!",
        );
        assert_matches!(store.write(same).await.unwrap(), WriteOutcome::Merged { citations: 2, .. });
        assert_matches!(
            store.write(discord("100/min")).await.unwrap(),
            WriteOutcome::Inserted(_)
        );
        assert_eq!(vectors.lock().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_candidates_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CuratedKnowledgeStore::new(dir.path());
        assert_matches!(
            store.write(Candidate::new("../etc", "", "x", "")).await,
            Err(KnowledgeError::InvalidCandidate(_))
        );
        assert_matches!(
            store.write(Candidate::new("render", " ", "", "")).await,
            Err(KnowledgeError::InvalidCandidate(_))
        );
    }

    #[tokio::test]
    async fn get_and_domains() {
        let dir = tempfile::tempdir().unwrap();
        let domains = vec![DomainSettings {
            file: Some("render-notes.md".into()),
            ..DomainSettings::new("render", &["render"])
        }];
        let store = CuratedKnowledgeStore::new(dir.path()).with_domain_files(&domains);

        let outcome = store
            .write(Candidate::new("render", "", "manim missing", "use venv"))
            .await
            .unwrap();
        let _ = store
            .write(Candidate::new("general", "", "git lfs quota hit", ""))
            .await
            .unwrap();

        assert!(dir.path().join("render-notes.md").exists());
        let got = store.get("render", outcome.id()).await.unwrap().unwrap();
        assert_eq!(got.rule, "use venv");
        assert!(store.get("render", "missing").await.unwrap().is_none());
        assert_eq!(store.domains().await.unwrap(), vec!["general", "render"]);
    }

    #[tokio::test]
    async fn read_missing_domain_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CuratedKnowledgeStore::new(dir.path().join("absent"));
        assert!(store.read("render").await.unwrap().is_empty());
        assert!(store.read("../x").await.unwrap().is_empty());
        assert!(store.domains().await.unwrap().is_empty());
    }

    #[test]
    fn merge_fills_empty_field_without_provenance() {
        let base = Candidate::new("render", "", "manim missing", "");
        let mut entry = KnowledgeEntry::from_candidate(&base);
        let later = Candidate::new("render", "", "", "use venv")
            .with_observed_at(base.observed_at + Duration::seconds(1));
        merge_into(&mut entry, &later);
        assert_eq!(entry.rule, "use venv");
        assert!(entry.provenance.is_empty());
        assert_eq!(entry.citations, 2);
    }
}
