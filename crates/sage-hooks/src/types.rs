//! Hook payloads and responses.
//!
//! Both sides of the hook contract are tagged enums with `camelCase` fields,
//! so the host can send `{"hook": "beforeToolCall", "sessionKey": ..., ...}`
//! and read back `{"kind": "toolCall", "params": ..., "env": ...}`.

use std::collections::BTreeMap;

use sage_core::{Transcript, TranscriptMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle hook type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookType {
    /// Before a prompt is sent to the model.
    BeforePromptBuild,
    /// Before a tool call executes. Forced-blocking.
    BeforeToolCall,
    /// After a session finishes.
    AgentEnd,
}

impl HookType {
    /// Returns `true` if this hook type is always executed in blocking mode.
    ///
    /// Both hooks that answer the host with a decision must finish before
    /// the host proceeds.
    #[must_use]
    pub fn is_forced_blocking(self) -> bool {
        matches!(self, Self::BeforePromptBuild | Self::BeforeToolCall)
    }

    /// Returns all hook type variants.
    #[must_use]
    pub fn all() -> &'static [HookType] {
        &[Self::BeforePromptBuild, Self::BeforeToolCall, Self::AgentEnd]
    }
}

impl std::fmt::Display for HookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BeforePromptBuild => write!(f, "beforePromptBuild"),
            Self::BeforeToolCall => write!(f, "beforeToolCall"),
            Self::AgentEnd => write!(f, "agentEnd"),
        }
    }
}

/// Hook execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookExecutionMode {
    /// Awaited before the engine answers.
    Blocking,
    /// Spawned and tracked; the engine answers immediately.
    Background,
}

/// Payload delivered by the host at a lifecycle point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hook", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HookContext {
    /// A prompt is about to be built for `session_key`.
    BeforePromptBuild {
        /// Host session key.
        session_key: String,
        /// Prompt text for this turn.
        prompt: String,
        /// Most recent messages before the prompt, oldest first.
        #[serde(default)]
        recent_messages: Vec<TranscriptMessage>,
        /// 0-based turn of the session, when the host tracks it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn_index: Option<u32>,
    },
    /// A tool call is about to run.
    BeforeToolCall {
        /// Host session key.
        session_key: String,
        /// Tool name.
        tool_name: String,
        /// Tool parameters as the model produced them.
        #[serde(default)]
        params: Value,
    },
    /// A session finished.
    AgentEnd {
        /// Host session key.
        session_key: String,
        /// Full transcript.
        #[serde(default)]
        transcript: Transcript,
        /// Whether the session completed its task.
        #[serde(default)]
        success: bool,
        /// Wall-clock session duration.
        #[serde(default)]
        duration_ms: u64,
    },
}

impl HookContext {
    /// Which hook this payload belongs to.
    #[must_use]
    pub fn hook_type(&self) -> HookType {
        match self {
            Self::BeforePromptBuild { .. } => HookType::BeforePromptBuild,
            Self::BeforeToolCall { .. } => HookType::BeforeToolCall,
            Self::AgentEnd { .. } => HookType::AgentEnd,
        }
    }

    /// Session the hook fired in.
    #[must_use]
    pub fn session_key(&self) -> &str {
        match self {
            Self::BeforePromptBuild { session_key, .. }
            | Self::BeforeToolCall { session_key, .. }
            | Self::AgentEnd { session_key, .. } => session_key,
        }
    }
}

/// Decision for a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallDecision {
    /// Parameters to execute with.
    pub params: Value,
    /// Environment variables to inject, never shown to the model.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Reason the call is blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
}

impl ToolCallDecision {
    /// Whether the call must not run.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.block.is_some()
    }
}

/// Answer returned to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HookResponse {
    /// Nothing to do.
    #[default]
    None,
    /// Text to prepend to the prompt.
    PrependContext {
        /// The context block.
        prepend_context: String,
    },
    /// Tool call rewrite, env injection, or block.
    ToolCall(ToolCallDecision),
}

impl HookResponse {
    /// Prepend `text` to the prompt.
    pub fn prepend(text: impl Into<String>) -> Self {
        Self::PrependContext {
            prepend_context: text.into(),
        }
    }

    /// Whether the host has nothing to apply.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Prepended text, if any.
    #[must_use]
    pub fn prepend_context(&self) -> Option<&str> {
        match self {
            Self::PrependContext { prepend_context } => Some(prepend_context),
            _ => None,
        }
    }

    /// Tool call decision, if any.
    #[must_use]
    pub fn tool_call(&self) -> Option<&ToolCallDecision> {
        match self {
            Self::ToolCall(decision) => Some(decision),
            _ => None,
        }
    }
}
