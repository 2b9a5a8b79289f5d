//! Hook registry: an append-only, registration-ordered list of hooks per instance.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use trellis_core::types::{InstanceId, Scope};

use super::definitions::HookKind;
use super::handler::HookFn;

/// Process-wide registration counter backing [`Hook::ordinal`].
static NEXT_ORDINAL: AtomicU64 = AtomicU64::new(0);

/// The instance that declared a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOrigin {
    /// Declaring instance.
    pub id: InstanceId,
    /// Declaring instance's name, for logs.
    pub name: Arc<str>,
}

impl fmt::Display for HookOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A registered hook.
#[derive(Debug, Clone)]
pub struct Hook {
    /// Stage the hook runs in.
    pub kind: HookKind,
    /// Effective scope from the holding registry's point of view.
    pub scope: Scope,
    /// Instance that declared the hook.
    pub origin: HookOrigin,
    /// Process-wide registration order.
    pub ordinal: u64,
    /// The function itself.
    pub func: HookFn,
}

impl Hook {
    /// Returns a copy carrying a different effective scope.
    pub fn retagged(&self, scope: Scope) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }
}

/// Ordered hooks visible from one instance: its own plus those inherited
/// from merged children.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    /// Hooks in registration/append order.
    hooks: Vec<Hook>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook declared by `origin`.
    pub fn register(&mut self, func: HookFn, scope: Scope, origin: &HookOrigin) -> &Hook {
        let hook = Hook {
            kind: func.kind(),
            scope,
            origin: origin.clone(),
            ordinal: NEXT_ORDINAL.fetch_add(1, Ordering::Relaxed),
            func,
        };

        debug!(
            kind = %hook.kind,
            scope = %hook.scope,
            origin = %hook.origin,
            ordinal = hook.ordinal,
            "Hook registered"
        );

        self.hooks.push(hook);
        &self.hooks[self.hooks.len() - 1]
    }

    /// Appends an ordered collection of hooks sharing one scope and origin.
    ///
    /// Equivalent to calling [`register`](Self::register) for each element in order.
    pub fn register_all<I>(&mut self, funcs: I, scope: Scope, origin: &HookOrigin) -> usize
    where
        I: IntoIterator<Item = HookFn>,
    {
        let mut registered = 0;
        for func in funcs {
            self.register(func, scope, origin);
            registered += 1;
        }
        registered
    }

    /// Appends a hook inherited from a merged child.
    pub(crate) fn append_inherited(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// Returns hooks matching `predicate`, in registration order.
    pub fn list<P>(&self, predicate: P) -> Vec<Hook>
    where
        P: Fn(&Hook) -> bool,
    {
        self.hooks.iter().filter(|hook| predicate(hook)).cloned().collect()
    }

    /// Returns hooks of one kind, in registration order.
    pub fn of_kind(&self, kind: HookKind) -> Vec<Hook> {
        self.list(|hook| hook.kind == kind)
    }

    /// Iterates over all hooks in order.
    pub fn iter(&self) -> impl Iterator<Item = &Hook> {
        self.hooks.iter()
    }

    /// Number of hooks of one kind.
    pub fn count(&self, kind: HookKind) -> usize {
        self.hooks.iter().filter(|hook| hook.kind == kind).count()
    }

    /// Total number of hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
