//! Scope resolution at merge time.
//!
//! When a child instance is merged into a parent, each of the child's
//! hooks is either dropped (`Local`), handed to the parent as `Local`
//! (`Scoped`, one hop only), or handed over unchanged (`Global`). The
//! parent keeps its own copy, so no live link to the child remains.

use tracing::debug;

use trellis_core::types::Scope;

use super::registry::{Hook, HookRegistry};

/// Decides which of a child's hooks a parent inherits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeResolver;

impl ScopeResolver {
    /// Returns the copy of `hook` the parent should hold, if any.
    pub fn resolve(hook: &Hook) -> Option<Hook> {
        hook.scope.after_merge().map(|scope| hook.retagged(scope))
    }

    /// Appends the child's inheritable hooks to the parent, after the
    /// parent's existing hooks and in the child's order.
    ///
    /// Returns the number of inherited hooks.
    pub fn inherit(parent: &mut HookRegistry, child: &HookRegistry) -> usize {
        let mut inherited = 0;

        for hook in child.iter() {
            match Self::resolve(hook) {
                Some(resolved) => {
                    debug!(
                        kind = %resolved.kind,
                        origin = %resolved.origin,
                        declared = %hook.scope,
                        effective = %resolved.scope,
                        "Hook inherited by parent"
                    );
                    parent.append_inherited(resolved);
                    inherited += 1;
                }
                None => {
                    debug!(
                        kind = %hook.kind,
                        origin = %hook.origin,
                        "Local hook stays with its instance"
                    );
                }
            }
        }

        inherited
    }
}
