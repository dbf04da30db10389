//! # sage-runtime
//!
//! Wires the knowledge components onto the host's lifecycle hooks.
//!
//! - **Orchestrator**: role gating, concurrent domain lookup and semantic
//!   retrieval, budgeted composition, enforcement, and transcript mining
//! - **Handlers**: one [`HookHandler`](sage_hooks::HookHandler) per hook,
//!   registered with a fail-open [`HookEngine`](sage_hooks::HookEngine)
//! - **Session tracker**: per-session turn counts for first-turn gating

#![deny(unsafe_code)]

pub mod errors;
pub mod handlers;
pub mod orchestrator;
pub mod runtime;
pub mod session;

pub use errors::{Result, RuntimeError};
pub use orchestrator::Orchestrator;
pub use runtime::SageRuntime;
pub use session::SessionTracker;
