//! Request pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Scope;

/// Settings for hook execution and error rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound for a single hook invocation in milliseconds (`0` = unbounded).
    #[serde(default)]
    pub hook_timeout_ms: u64,
    /// Whether 5xx error replies carry the underlying error message.
    #[serde(default = "default_true")]
    pub expose_error_messages: bool,
    /// Scope applied to hooks registered without explicit options.
    #[serde(default)]
    pub default_scope: Scope,
}

impl PipelineConfig {
    /// Returns the per-hook timeout, if one is configured.
    pub fn hook_timeout(&self) -> Option<Duration> {
        (self.hook_timeout_ms > 0).then(|| Duration::from_millis(self.hook_timeout_ms))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hook_timeout_ms: 0,
            expose_error_messages: true,
            default_scope: Scope::default(),
        }
    }
}

fn default_true() -> bool {
    true
}
