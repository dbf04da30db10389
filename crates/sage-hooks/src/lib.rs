//! # sage-hooks
//!
//! Lifecycle hooks Sage answers on behalf of the host runtime:
//! [`BeforePromptBuild`](types::HookType::BeforePromptBuild) (prepend context
//! to a worker prompt), [`BeforeToolCall`](types::HookType::BeforeToolCall)
//! (rewrite or block a tool call), and [`AgentEnd`](types::HookType::AgentEnd)
//! (mine the finished transcript).
//!
//! ## Execution Model
//!
//! - **Blocking**: sequential, priority-ordered, each under a timeout.
//! - **Background**: spawned and tracked so shutdown can drain them.
//!
//! ## Fail-Open
//!
//! Handler errors, timeouts and panics never reach the host. They are logged
//! and the hook answers [`HookResponse::None`](types::HookResponse::None).

#![deny(unsafe_code)]

pub mod background;
pub mod engine;
pub mod errors;
pub mod handler;
pub mod registry;
pub mod types;

pub use background::BackgroundTracker;
pub use engine::HookEngine;
pub use errors::HookError;
pub use handler::HookHandler;
pub use registry::HookRegistry;
pub use types::{HookContext, HookExecutionMode, HookResponse, HookType, ToolCallDecision};
