//! # sage-settings
//!
//! Configuration management for the Sage knowledge engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SageSettings::default()`]
//! 2. **User file**: `~/.sage/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SAGE_*` overrides (highest priority)
//!
//! The merged result is validated before it is returned. A malformed domain
//! table or rewrite-rule table is a hard error: the engine refuses to start
//! rather than run on a partial configuration.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;
pub mod validate;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, expand_home, load_settings, load_settings_from_path, settings_path};
pub use types::*;
pub use validate::validate;
