//! The knowledge loop: inject on prompt build, enforce on tool call, learn on
//! session end.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use sage_core::{MonotonicClock, Role, TranscriptMessage, classify};
use sage_embeddings::{EmbeddingProvider, SharedVectorRepository, VectorRepository, build_provider};
use sage_enforcement::EnforcementRewriter;
use sage_hooks::ToolCallDecision;
use sage_knowledge::{
    ComposeOptions, CuratedKnowledgeStore, DomainMatcher, KnowledgeEntry, KnowledgeStore,
    SemanticRetriever, TranscriptExtractor, WriteOutcome, compose,
};
use sage_settings::{SageSettings, expand_home, validate};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::session::SessionTracker;

/// Owns every component and implements the three hook operations.
pub struct Orchestrator {
    settings: SageSettings,
    matcher: Arc<DomainMatcher>,
    store: Arc<dyn KnowledgeStore>,
    retriever: SemanticRetriever,
    extractor: TranscriptExtractor,
    rewriter: EnforcementRewriter,
    sessions: SessionTracker,
    clock: MonotonicClock,
}

impl Orchestrator {
    /// Build every component from settings.
    ///
    /// Fails on an invalid configuration or an unusable vector index; the
    /// engine does not start on a partial configuration.
    pub fn from_settings(settings: &SageSettings) -> Result<Self> {
        validate(settings)?;
        let provider = build_provider(&settings.embedding)?;
        let vectors =
            VectorRepository::open(&expand_home(&settings.knowledge.vector_db_path))?.shared();
        let store = Arc::new(CuratedKnowledgeStore::from_settings(
            settings,
            Arc::clone(&provider),
            vectors.clone(),
        ));
        let sessions = SessionTracker::persistent(expand_home(&settings.knowledge.session_dir));
        Ok(Self::with_parts(settings.clone(), provider, vectors, store)?.with_sessions(sessions))
    }

    /// Build from pre-constructed storage and provider.
    pub fn with_parts(
        settings: SageSettings,
        provider: Arc<dyn EmbeddingProvider>,
        vectors: SharedVectorRepository,
        store: Arc<dyn KnowledgeStore>,
    ) -> Result<Self> {
        validate(&settings)?;
        let matcher = Arc::new(DomainMatcher::new(&settings.domains)?);
        let retriever = SemanticRetriever::with_settings(
            provider,
            vectors,
            Arc::clone(&store),
            &settings.retrieval,
        );
        let extractor = TranscriptExtractor::new(Arc::clone(&matcher), settings.extraction.clone());
        let rewriter = EnforcementRewriter::from_settings(&settings);
        debug!(
            domains = settings.domains.len(),
            rewrite_rules = rewriter.len(),
            "Orchestrator initialized"
        );
        Ok(Self {
            settings,
            matcher,
            store,
            retriever,
            extractor,
            rewriter,
            sessions: SessionTracker::new(),
            clock: MonotonicClock::new(),
        })
    }

    /// Replace the in-memory turn tracker.
    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionTracker) -> Self {
        self.sessions = sessions;
        self
    }

    /// Active settings.
    pub fn settings(&self) -> &SageSettings {
        &self.settings
    }

    /// Domain classifier.
    pub fn matcher(&self) -> &DomainMatcher {
        &self.matcher
    }

    /// Knowledge store.
    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    fn injects(&self, role: Role) -> bool {
        match role {
            Role::Main => false,
            Role::Subagent => true,
            Role::Cron => self.settings.injection.inject_cron,
        }
    }

    /// Context to prepend to a prompt, if any.
    ///
    /// A host-supplied `turn_index` takes precedence over the tracker's count.
    pub async fn before_prompt_build(
        &self,
        session_key: &str,
        prompt: &str,
        recent_messages: &[TranscriptMessage],
        turn_index: Option<u32>,
    ) -> Option<String> {
        let injection = &self.settings.injection;
        let role = classify(session_key);
        if !injection.enabled || !self.injects(role) {
            debug!(%role, "injection skipped for role");
            return None;
        }
        let turn = turn_index.unwrap_or_else(|| self.sessions.begin_turn(session_key));
        if injection.first_turn_only && turn > 0 {
            debug!(turn, "injection skipped after first turn");
            return None;
        }

        let domains =
            self.matcher
                .match_prompt(prompt, recent_messages, injection.recent_message_window);
        debug!(?domains, "matched domains");

        let reads = join_all(domains.iter().map(|d| self.store.read(d)));
        let semantic = async {
            if self.settings.retrieval.enabled {
                self.retriever.retrieve(prompt).await
            } else {
                Vec::new()
            }
        };
        let (reads, semantic) = tokio::join!(reads, semantic);

        let sections: Vec<(String, Vec<KnowledgeEntry>)> = domains
            .into_iter()
            .zip(reads)
            .filter_map(|(domain, read)| match read {
                Ok(entries) => Some((domain, entries)),
                Err(error) => {
                    warn!(%domain, %error, "failed to read domain knowledge, skipping");
                    None
                }
            })
            .collect();

        let opts = ComposeOptions::from_settings(injection, Utc::now());
        let context = compose(&sections, &semantic, &opts);
        if let Some(text) = &context {
            info!(
                sections = sections.len(),
                semantic = semantic.len(),
                chars = text.chars().count(),
                "injecting knowledge"
            );
        }
        context
    }

    /// Rewrite, env injection, or block for a tool call.
    pub fn before_tool_call(
        &self,
        session_key: &str,
        tool_name: &str,
        params: &Value,
    ) -> Option<ToolCallDecision> {
        let role = classify(session_key);
        let outcome = self.rewriter.rewrite(tool_name, params, role);
        let rule_id = outcome.rule_id?;
        if outcome.block.is_some() {
            info!(%rule_id, tool_name, %role, "tool call blocked");
        } else {
            debug!(%rule_id, tool_name, "tool call rewritten");
        }
        Some(ToolCallDecision {
            params: outcome.params,
            env: outcome.env,
            block: outcome.block,
        })
    }

    /// Mine a finished session and merge what it learned. Returns the
    /// number of candidates written.
    pub async fn agent_end(
        &self,
        session_key: &str,
        transcript: &[TranscriptMessage],
        success: bool,
    ) -> usize {
        self.sessions.end(session_key);
        let role = classify(session_key);
        if role == Role::Main {
            return 0;
        }

        let candidates = self
            .extractor
            .extract(transcript, role, success, transcript.len());
        if candidates.is_empty() {
            debug!(messages = transcript.len(), success, "nothing extracted");
            return 0;
        }

        let mut written = 0;
        for candidate in candidates {
            let candidate = candidate
                .with_source(session_key)
                .with_observed_at(self.clock.now());
            let domain = candidate.domain.clone();
            match self.store.write(candidate).await {
                Ok(WriteOutcome::Inserted(id)) => {
                    debug!(%domain, %id, "new knowledge entry");
                    written += 1;
                }
                Ok(WriteOutcome::Merged { id, citations }) => {
                    debug!(%domain, %id, citations, "merged into existing entry");
                    written += 1;
                }
                Err(error) => warn!(%domain, %error, "failed to store candidate"),
            }
        }
        info!(written, "transcript mined");
        written
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("domains", &self.settings.domains.len())
            .field("rewrite_rules", &self.rewriter.len())
            .field("active_sessions", &self.sessions.active())
            .finish_non_exhaustive()
    }
}
