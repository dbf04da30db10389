//! Hook handler trait.
//!
//! Handlers are registered with the [`HookRegistry`](crate::registry::HookRegistry)
//! and executed by the [`HookEngine`](crate::engine::HookEngine).

use async_trait::async_trait;

use crate::errors::HookError;
use crate::types::{HookContext, HookExecutionMode, HookResponse, HookType};

/// A lifecycle hook handler.
///
/// # Priority
///
/// Higher priority handlers run first. Default priority is 0.
///
/// # Execution Mode
///
/// Forced-blocking hook types always run in blocking mode regardless of the
/// declared mode. A background handler's response is discarded.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Unique name for this handler.
    fn name(&self) -> &str;

    /// Which lifecycle event this handler responds to.
    fn hook_type(&self) -> HookType;

    /// Execution priority. Higher runs first. Default: 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Preferred execution mode. Default: Blocking.
    fn execution_mode(&self) -> HookExecutionMode {
        HookExecutionMode::Blocking
    }

    /// Timeout override in milliseconds.
    ///
    /// Blocking handlers fall back to the engine's default. Background
    /// handlers without one run until done or drained.
    fn timeout_ms(&self) -> Option<u64> {
        None
    }

    /// Execute the handler with the given context.
    async fn handle(&self, context: &HookContext) -> Result<HookResponse, HookError>;

    /// Optional filter. Return `false` to skip this handler for the context.
    fn should_handle(&self, _context: &HookContext) -> bool {
        true
    }
}
