//! Hook kind and registration option definitions.

use serde::{Deserialize, Serialize};

use trellis_core::types::Scope;

/// Enumeration of all lifecycle stages a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Transform family (`transform` and `derive`). Returns properties merged into the context.
    Transform,
    /// Runs after the context is built. May short-circuit with a reply.
    BeforeHandle,
    /// Runs after the handler. May replace the reply.
    AfterHandle,
    /// Runs when any stage fails. The first hook returning a reply handles the error.
    Error,
    /// Observes the final reply. Cannot change it.
    Response,
}

impl HookKind {
    /// Every kind in pipeline order.
    pub const ALL: [HookKind; 5] = [
        Self::Transform,
        Self::BeforeHandle,
        Self::AfterHandle,
        Self::Error,
        Self::Response,
    ];

    /// Returns the string name of this hook kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::BeforeHandle => "before_handle",
            Self::AfterHandle => "after_handle",
            Self::Error => "error",
            Self::Response => "response",
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options accepted by every hook registration call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookOptions {
    /// Visibility scope. `None` falls back to the instance default.
    #[serde(default)]
    pub scope: Option<Scope>,
}

impl HookOptions {
    /// Options with an explicit scope.
    pub fn scope(scope: Scope) -> Self {
        Self { scope: Some(scope) }
    }

    /// Options from the boolean `scoped` flag (`true` = local, `false` = global).
    pub fn scoped(scoped: bool) -> Self {
        Self::scope(Scope::from_scoped_flag(scoped))
    }

    /// Resolves the effective scope against an instance default.
    pub fn resolve(&self, default: Scope) -> Scope {
        self.scope.unwrap_or(default)
    }
}

impl From<Scope> for HookOptions {
    fn from(scope: Scope) -> Self {
        Self::scope(scope)
    }
}
