//! Hook-facing entry point.

use std::sync::Arc;
use std::time::Duration;

use sage_hooks::{HookContext, HookEngine, HookRegistry, HookResponse};
use sage_settings::SageSettings;
use tracing::info;

use crate::errors::Result;
use crate::handlers::{PromptInjectionHandler, ToolEnforcementHandler, TranscriptMiningHandler};
use crate::orchestrator::Orchestrator;

/// The orchestrator registered on a fail-open hook engine.
#[derive(Debug)]
pub struct SageRuntime {
    orchestrator: Arc<Orchestrator>,
    engine: HookEngine,
    drain_timeout: Duration,
}

impl SageRuntime {
    /// Build the orchestrator from settings and register its handlers.
    pub fn from_settings(settings: &SageSettings) -> Result<Self> {
        Ok(Self::new(Arc::new(Orchestrator::from_settings(settings)?)))
    }

    /// Register the handlers of an existing orchestrator.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let hooks = orchestrator.settings().hooks.clone();
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(PromptInjectionHandler::new(Arc::clone(&orchestrator))));
        registry.register(Arc::new(ToolEnforcementHandler::new(Arc::clone(&orchestrator))));
        registry.register(Arc::new(TranscriptMiningHandler::new(Arc::clone(&orchestrator))));
        Self {
            orchestrator,
            engine: HookEngine::new(registry).with_timeout_ms(hooks.timeout_ms),
            drain_timeout: Duration::from_millis(hooks.drain_timeout_ms),
        }
    }

    /// The orchestrator.
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Answer one hook. Never fails.
    pub async fn dispatch(&self, context: &HookContext) -> HookResponse {
        self.engine.execute(context).await
    }

    /// Background work still in flight.
    pub fn pending_background(&self) -> usize {
        self.engine.pending_background()
    }

    /// Wait for background mining, bounded by the configured drain timeout.
    pub async fn shutdown(&self) -> bool {
        let pending = self.engine.pending_background();
        let drained = self.engine.drain(self.drain_timeout).await;
        info!(pending, drained, "runtime shut down");
        drained
    }
}
