//! Hook execution engine.
//!
//! Blocking handlers run sequentially in priority order:
//! - A blocked tool call stops the chain immediately.
//! - The first tool call decision is kept; later ones are ignored.
//! - Prepended context from several handlers is joined with a blank line.
//!
//! Background handlers are spawned on the [`BackgroundTracker`] and the
//! engine answers without waiting for them.
//!
//! # Fail-Open
//!
//! Errors, timeouts and panics are logged and treated as
//! [`HookResponse::None`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{Instrument, debug, info_span, warn};

use crate::background::BackgroundTracker;
use crate::errors::HookError;
use crate::handler::HookHandler;
use crate::registry::HookRegistry;
use crate::types::{HookContext, HookExecutionMode, HookResponse, HookType};

/// Default per-handler budget for blocking hooks.
pub const DEFAULT_TIMEOUT_MS: u64 = 300;

/// Hook execution engine.
pub struct HookEngine {
    registry: HookRegistry,
    background: BackgroundTracker,
    default_timeout_ms: u64,
}

impl HookEngine {
    /// Create a new engine with the given registry.
    #[must_use]
    pub fn new(registry: HookRegistry) -> Self {
        Self {
            registry,
            background: BackgroundTracker::new(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Override the default blocking-handler timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// The handler registry.
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Number of background tasks still running.
    pub fn pending_background(&self) -> usize {
        self.background.pending_count()
    }

    /// Wait for background work, giving up after `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.background.drain_with_timeout(timeout).await
    }

    /// Run every handler registered for the context's hook type.
    pub async fn execute(&self, context: &HookContext) -> HookResponse {
        let hook_type = context.hook_type();
        let span = info_span!("hook", hook = %hook_type, session = %context.session_key());
        self.execute_inner(hook_type, context).instrument(span).await
    }

    async fn execute_inner(&self, hook_type: HookType, context: &HookContext) -> HookResponse {
        let handlers = self.registry.get_handlers(hook_type);
        if handlers.is_empty() {
            return HookResponse::None;
        }

        let start = Instant::now();
        let (blocking, background): (Vec<_>, Vec<_>) = handlers
            .into_iter()
            .filter(|h| {
                let keep = h.should_handle(context);
                if !keep {
                    debug!(name = %h.name(), "Hook skipped by filter");
                }
                keep
            })
            .partition(|h| effective_mode(h.as_ref(), hook_type) == HookExecutionMode::Blocking);

        for handler in background {
            self.spawn_background(handler, context.clone());
        }

        let response = self.execute_blocking(&blocking, context).await;

        debug!(
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            kind = response_kind(&response),
            "Hook execution complete"
        );
        response
    }

    async fn execute_blocking(
        &self,
        handlers: &[Arc<dyn HookHandler>],
        context: &HookContext,
    ) -> HookResponse {
        let mut prepended: Vec<String> = Vec::new();
        let mut decision = None;

        for handler in handlers {
            let timeout_ms = handler.timeout_ms().unwrap_or(self.default_timeout_ms);
            match run_handler(handler.as_ref(), context, Some(timeout_ms)).await {
                HookResponse::None => {}
                HookResponse::PrependContext { prepend_context } => prepended.push(prepend_context),
                HookResponse::ToolCall(d) => {
                    if d.is_blocked() {
                        debug!(name = %handler.name(), reason = d.block.as_deref().unwrap_or_default(), "Hook blocked tool call");
                        return HookResponse::ToolCall(d);
                    }
                    if decision.is_none() {
                        decision = Some(d);
                    }
                }
            }
        }

        if let Some(d) = decision {
            HookResponse::ToolCall(d)
        } else if prepended.is_empty() {
            HookResponse::None
        } else {
            HookResponse::prepend(prepended.join("\n\n"))
        }
    }

    fn spawn_background(&self, handler: Arc<dyn HookHandler>, context: HookContext) {
        let span = info_span!("hook", hook = %context.hook_type(), session = %context.session_key(), background = true);
        self.background.spawn(
            async move {
                let timeout_ms = handler.timeout_ms();
                let _ = run_handler(handler.as_ref(), &context, timeout_ms).await;
            }
            .instrument(span),
        );
    }
}

impl std::fmt::Debug for HookEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookEngine")
            .field("registry", &self.registry)
            .field("background", &self.background)
            .field("default_timeout_ms", &self.default_timeout_ms)
            .finish()
    }
}

fn effective_mode(handler: &dyn HookHandler, hook_type: HookType) -> HookExecutionMode {
    if hook_type.is_forced_blocking() {
        HookExecutionMode::Blocking
    } else {
        handler.execution_mode()
    }
}

fn response_kind(response: &HookResponse) -> &'static str {
    match response {
        HookResponse::None => "none",
        HookResponse::PrependContext { .. } => "prependContext",
        HookResponse::ToolCall(_) => "toolCall",
    }
}

/// Run one handler, converting every failure into `None`.
async fn run_handler(
    handler: &dyn HookHandler,
    context: &HookContext,
    timeout_ms: Option<u64>,
) -> HookResponse {
    match try_run_handler(handler, context, timeout_ms).await {
        Ok(response) => response,
        Err(error) => {
            warn!(name = %handler.name(), %error, "Hook failed (fail-open)");
            HookResponse::None
        }
    }
}

async fn try_run_handler(
    handler: &dyn HookHandler,
    context: &HookContext,
    timeout_ms: Option<u64>,
) -> Result<HookResponse, HookError> {
    let guarded = AssertUnwindSafe(handler.handle(context)).catch_unwind();
    let outcome = match timeout_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), guarded)
            .await
            .map_err(|_| HookError::Timeout {
                name: handler.name().to_string(),
                timeout_ms: ms,
            })?,
        None => guarded.await,
    };
    outcome.map_err(|_| HookError::Panicked {
        name: handler.name().to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCallDecision;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Respond(HookResponse),
        Fail,
        Panic,
        Sleep(Duration),
        Count(Arc<AtomicUsize>),
    }

    struct TestHandler {
        name: &'static str,
        hook_type: HookType,
        priority: i32,
        mode: HookExecutionMode,
        behavior: Behavior,
    }

    #[async_trait]
    impl HookHandler for TestHandler {
        fn name(&self) -> &str {
            self.name
        }
        fn hook_type(&self) -> HookType {
            self.hook_type
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn execution_mode(&self) -> HookExecutionMode {
            self.mode
        }
        async fn handle(&self, _context: &HookContext) -> Result<HookResponse, HookError> {
            match &self.behavior {
                Behavior::Respond(r) => Ok(r.clone()),
                Behavior::Fail => Err(HookError::handler(self.name, "broken")),
                Behavior::Panic => panic!("handler exploded"),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(HookResponse::prepend("late"))
                }
                Behavior::Count(c) => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    let _ = c.fetch_add(1, Ordering::SeqCst);
                    Ok(HookResponse::None)
                }
            }
        }
    }

    fn handler(
        name: &'static str,
        hook_type: HookType,
        priority: i32,
        behavior: Behavior,
    ) -> Arc<dyn HookHandler> {
        Arc::new(TestHandler {
            name,
            hook_type,
            priority,
            mode: HookExecutionMode::Blocking,
            behavior,
        })
    }

    fn prompt_ctx() -> HookContext {
        HookContext::BeforePromptBuild {
            session_key: "agent:main:subagent:1".into(),
            prompt: "render".into(),
            recent_messages: Vec::new(),
            turn_index: None,
        }
    }

    fn tool_ctx() -> HookContext {
        HookContext::BeforeToolCall {
            session_key: "agent:main:subagent:1".into(),
            tool_name: "exec".into(),
            params: json!({"command": "ls"}),
        }
    }

    fn decision(block: Option<&str>) -> HookResponse {
        HookResponse::ToolCall(ToolCallDecision {
            params: json!({"command": "ls -la"}),
            env: BTreeMap::new(),
            block: block.map(String::from),
        })
    }

    fn engine(handlers: Vec<Arc<dyn HookHandler>>) -> HookEngine {
        let mut registry = HookRegistry::new();
        for h in handlers {
            registry.register(h);
        }
        HookEngine::new(registry)
    }

    #[tokio::test]
    async fn no_handlers_is_none() {
        let engine = engine(vec![]);
        assert!(engine.execute(&prompt_ctx()).await.is_none());
    }

    #[tokio::test]
    async fn prepended_context_joined_in_priority_order() {
        let engine = engine(vec![
            handler("b", HookType::BeforePromptBuild, 1, Behavior::Respond(HookResponse::prepend("second"))),
            handler("a", HookType::BeforePromptBuild, 9, Behavior::Respond(HookResponse::prepend("first"))),
        ]);
        let response = engine.execute(&prompt_ctx()).await;
        assert_eq!(response.prepend_context(), Some("first\n\nsecond"));
    }

    #[tokio::test]
    async fn errors_fail_open() {
        let engine = engine(vec![
            handler("bad", HookType::BeforePromptBuild, 5, Behavior::Fail),
            handler("good", HookType::BeforePromptBuild, 1, Behavior::Respond(HookResponse::prepend("ok"))),
        ]);
        assert_eq!(engine.execute(&prompt_ctx()).await.prepend_context(), Some("ok"));
    }

    #[tokio::test]
    async fn panics_fail_open() {
        let engine = engine(vec![handler("boom", HookType::BeforeToolCall, 0, Behavior::Panic)]);
        assert!(engine.execute(&tool_ctx()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_fail_open() {
        let engine = engine(vec![handler(
            "slow",
            HookType::BeforePromptBuild,
            0,
            Behavior::Sleep(Duration::from_secs(5)),
        )])
        .with_timeout_ms(300);
        assert!(engine.execute(&prompt_ctx()).await.is_none());
    }

    #[tokio::test]
    async fn block_short_circuits() {
        let engine = engine(vec![
            handler("allow", HookType::BeforeToolCall, 10, Behavior::Respond(decision(None))),
            handler("deny", HookType::BeforeToolCall, 5, Behavior::Respond(decision(Some("no")))),
        ]);
        let response = engine.execute(&tool_ctx()).await;
        assert_eq!(response.tool_call().and_then(|d| d.block.as_deref()), Some("no"));
    }

    #[tokio::test]
    async fn first_decision_wins() {
        let first = decision(None);
        let engine = engine(vec![
            handler("one", HookType::BeforeToolCall, 10, Behavior::Respond(first.clone())),
            handler(
                "two",
                HookType::BeforeToolCall,
                5,
                Behavior::Respond(HookResponse::ToolCall(ToolCallDecision {
                    params: json!({"command": "other"}),
                    env: BTreeMap::new(),
                    block: None,
                })),
            ),
        ]);
        assert_eq!(engine.execute(&tool_ctx()).await, first);
    }

    #[tokio::test]
    async fn background_handlers_are_tracked() {
        let count = Arc::new(AtomicUsize::new(0));
        let engine = engine(vec![Arc::new(TestHandler {
            name: "mine",
            hook_type: HookType::AgentEnd,
            priority: 0,
            mode: HookExecutionMode::Background,
            behavior: Behavior::Count(Arc::clone(&count)),
        })]);
        let ctx = HookContext::AgentEnd {
            session_key: "agent:main:subagent:1".into(),
            transcript: Vec::new(),
            success: true,
            duration_ms: 10,
        };
        assert!(engine.execute(&ctx).await.is_none());
        assert!(engine.drain(Duration::from_secs(5)).await);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(engine.pending_background(), 0);
    }

    #[tokio::test]
    async fn forced_blocking_ignores_background_mode() {
        let engine = engine(vec![Arc::new(TestHandler {
            name: "enforce",
            hook_type: HookType::BeforeToolCall,
            priority: 0,
            mode: HookExecutionMode::Background,
            behavior: Behavior::Respond(decision(None)),
        })]);
        assert!(engine.execute(&tool_ctx()).await.tool_call().is_some());
    }

    #[tokio::test]
    async fn error_conversion_reports_timeout() {
        let h = TestHandler {
            name: "slow",
            hook_type: HookType::BeforePromptBuild,
            priority: 0,
            mode: HookExecutionMode::Blocking,
            behavior: Behavior::Sleep(Duration::from_secs(5)),
        };
        let err = try_run_handler(&h, &prompt_ctx(), Some(10)).await.unwrap_err();
        assert_matches!(err, HookError::Timeout { timeout_ms: 10, .. });
    }
}
