//! Struct-based plugins.

use crate::instance::Instance;

/// A reusable bundle of state, hooks and routes.
///
/// [`Instance::install`] hands `install` a fresh instance named after the
/// plugin and merges the result, so a plugin installed twice runs once.
pub trait Plugin: Send + Sync {
    /// Plugin name, used for deduplication and logs.
    fn name(&self) -> &str;

    /// Registers the plugin's contributions on `instance`.
    fn install(&self, instance: Instance) -> Instance;
}
