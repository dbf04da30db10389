//! Hook handlers backed by the [`Orchestrator`].

use std::sync::Arc;

use async_trait::async_trait;
use sage_hooks::{HookContext, HookError, HookExecutionMode, HookHandler, HookResponse, HookType};

use crate::orchestrator::Orchestrator;

/// Prepends matched and retrieved knowledge to a worker prompt.
pub struct PromptInjectionHandler {
    orchestrator: Arc<Orchestrator>,
    timeout_ms: u64,
}

impl PromptInjectionHandler {
    /// Budget is the embedding deadline plus the hook budget.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let settings = orchestrator.settings();
        let timeout_ms = settings
            .retrieval
            .timeout_ms
            .saturating_add(settings.hooks.timeout_ms);
        Self {
            orchestrator,
            timeout_ms,
        }
    }
}

#[async_trait]
impl HookHandler for PromptInjectionHandler {
    fn name(&self) -> &str {
        "knowledge-injection"
    }

    fn hook_type(&self) -> HookType {
        HookType::BeforePromptBuild
    }

    fn timeout_ms(&self) -> Option<u64> {
        Some(self.timeout_ms)
    }

    async fn handle(&self, context: &HookContext) -> Result<HookResponse, HookError> {
        let HookContext::BeforePromptBuild {
            session_key,
            prompt,
            recent_messages,
            turn_index,
        } = context
        else {
            return Ok(HookResponse::None);
        };
        Ok(self
            .orchestrator
            .before_prompt_build(session_key, prompt, recent_messages, *turn_index)
            .await
            .map_or(HookResponse::None, HookResponse::prepend))
    }
}

/// Applies the rewrite table to tool calls.
pub struct ToolEnforcementHandler {
    orchestrator: Arc<Orchestrator>,
}

impl ToolEnforcementHandler {
    /// Create the handler.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl HookHandler for ToolEnforcementHandler {
    fn name(&self) -> &str {
        "tool-enforcement"
    }

    fn hook_type(&self) -> HookType {
        HookType::BeforeToolCall
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn handle(&self, context: &HookContext) -> Result<HookResponse, HookError> {
        let HookContext::BeforeToolCall {
            session_key,
            tool_name,
            params,
        } = context
        else {
            return Ok(HookResponse::None);
        };
        Ok(self
            .orchestrator
            .before_tool_call(session_key, tool_name, params)
            .map_or(HookResponse::None, HookResponse::ToolCall))
    }
}

/// Mines finished transcripts in the background.
pub struct TranscriptMiningHandler {
    orchestrator: Arc<Orchestrator>,
}

impl TranscriptMiningHandler {
    /// Create the handler.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl HookHandler for TranscriptMiningHandler {
    fn name(&self) -> &str {
        "transcript-mining"
    }

    fn hook_type(&self) -> HookType {
        HookType::AgentEnd
    }

    fn execution_mode(&self) -> HookExecutionMode {
        HookExecutionMode::Background
    }

    async fn handle(&self, context: &HookContext) -> Result<HookResponse, HookError> {
        if let HookContext::AgentEnd {
            session_key,
            transcript,
            success,
            ..
        } = context
        {
            let _ = self
                .orchestrator
                .agent_end(session_key, transcript, *success)
                .await;
        }
        Ok(HookResponse::None)
    }
}
