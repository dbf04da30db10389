//! # sage-enforcement
//!
//! Table-driven enforcement of tool calls.
//!
//! - Rules are matched in table order; the first match wins
//! - A match may rewrite the target parameter, inject environment
//!   variables the model never sees, or block the call
//! - Rewrites are idempotent: already-rewritten input passes through

#![deny(unsafe_code)]

pub mod rewriter;

pub use rewriter::{EnforcementRewriter, RewriteOutcome};
