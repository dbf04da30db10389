//! Package-level constants.

/// Current version of the Sage engine (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "sage";

/// Name of the per-user state directory under `$HOME`.
pub const STATE_DIR: &str = ".sage";
