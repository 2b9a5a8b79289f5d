//! Context construction.
//!
//! The builder seeds a fresh context with request metadata, the store and
//! the route's decorations, then runs the route's transform chain in
//! order. Each function sees every property contributed before it, and
//! later contributions overwrite earlier ones under the same key.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use trellis_core::error::AppError;
use trellis_core::result::AppResult;

use crate::context::{Context, RequestInfo};
use crate::hooks::definitions::HookKind;
use crate::hooks::handler::HookFn;
use crate::hooks::registry::Hook;
use crate::route::CompiledRoute;
use crate::store::Store;

/// Builds request contexts by running transform chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder {
    /// Upper bound on a single hook invocation.
    hook_timeout: Option<Duration>,
}

impl ContextBuilder {
    /// Creates a builder. `None` disables per-hook timeouts.
    pub fn new(hook_timeout: Option<Duration>) -> Self {
        Self { hook_timeout }
    }

    /// The context a route starts from, before any transform runs.
    pub fn initial(route: &CompiledRoute, request: RequestInfo, store: Store) -> Context {
        let mut ctx = Context::new(request, store).with_route(route.path.clone());
        ctx.merge((*route.decorations).clone());
        ctx
    }

    /// Runs the route's transform chain against `ctx`.
    ///
    /// The first failing function aborts the chain and its error is returned.
    pub async fn build(&self, ctx: &mut Context, route: &CompiledRoute) -> AppResult<()> {
        let chain = route.chain.hooks(HookKind::Transform);
        if chain.is_empty() {
            return Ok(());
        }

        debug!(route = %route, transforms = chain.len(), "Building context");

        for hook in chain {
            let HookFn::Transform(handler) = &hook.func else {
                continue;
            };
            let derived = self.bounded(hook, handler.transform(ctx)).await.map_err(|err| {
                warn!(
                    route = %route,
                    origin = %hook.origin,
                    error = %err,
                    "Transform hook failed"
                );
                err
            })?;
            let merged = ctx.merge(derived);
            debug!(origin = %hook.origin, merged, "Transform hook contributed");
        }

        Ok(())
    }

    /// Awaits a hook future under the configured timeout.
    pub(crate) async fn bounded<T, F>(&self, hook: &Hook, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let Some(limit) = self.hook_timeout else {
            return fut.await;
        };

        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    kind = %hook.kind,
                    origin = %hook.origin,
                    timeout_ms = limit.as_millis() as u64,
                    "Hook timed out"
                );
                Err(AppError::timeout(format!(
                    "{} hook from '{}' exceeded {}ms",
                    hook.kind,
                    hook.origin,
                    limit.as_millis()
                )))
            }
        }
    }
}
