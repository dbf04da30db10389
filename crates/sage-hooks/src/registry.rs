//! Hook registry.
//!
//! Maintains a priority-sorted collection of [`HookHandler`] instances per
//! [`HookType`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::handler::HookHandler;
use crate::types::HookType;

/// Registry of lifecycle hook handlers.
#[derive(Default)]
pub struct HookRegistry {
    /// Handlers keyed by hook type, sorted by priority descending.
    hooks: HashMap<HookType, Vec<Arc<dyn HookHandler>>>,
}

impl HookRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any handler of the same name and type.
    pub fn register(&mut self, handler: Arc<dyn HookHandler>) {
        let hook_type = handler.hook_type();
        let name = handler.name().to_string();

        let handlers = self.hooks.entry(hook_type).or_default();
        handlers.retain(|h| h.name() != name);

        debug!(name = %name, hook_type = %hook_type, priority = handler.priority(), "Registering hook");
        handlers.push(handler);

        // Stable, so equal priorities keep registration order
        handlers.sort_by_key(|h| std::cmp::Reverse(h.priority()));
    }

    /// Unregister a handler by name across all types.
    pub fn unregister(&mut self, name: &str) -> bool {
        let mut found = false;
        for handlers in self.hooks.values_mut() {
            let before_len = handlers.len();
            handlers.retain(|h| h.name() != name);
            found |= handlers.len() < before_len;
        }
        if found {
            debug!(name = %name, "Unregistered hook");
        }
        found
    }

    /// Handlers for a hook type, highest priority first.
    #[must_use]
    pub fn get_handlers(&self, hook_type: HookType) -> Vec<Arc<dyn HookHandler>> {
        self.hooks.get(&hook_type).cloned().unwrap_or_default()
    }

    /// Names of all registered handlers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .hooks
            .values()
            .flatten()
            .map(|h| h.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Total number of registered handlers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hook_count", &self.count())
            .finish()
    }
}
