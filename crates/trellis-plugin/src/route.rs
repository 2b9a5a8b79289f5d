//! Route handlers and the per-route resolved hook chain.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures::FutureExt;
use futures::future::BoxFuture;

use trellis_core::error::AppError;
use trellis_core::result::AppResult;
use trellis_core::types::RouteId;

use crate::context::{Context, Derived};
use crate::hooks::definitions::HookKind;
use crate::hooks::registry::{Hook, HookOrigin, HookRegistry};
use crate::reply::Reply;

/// Path segment that captures the rest of the path. Only valid as the last segment.
pub const WILDCARD: &str = "*";

/// A route handler invoked with the finished context.
#[derive(Clone)]
pub struct Handler {
    f: Arc<dyn Fn(&Context) -> BoxFuture<'static, AppResult<Reply>> + Send + Sync>,
}

impl Handler {
    /// Wraps a closure returning anything convertible into a [`Reply`].
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        Self {
            f: Arc::new(move |ctx: &Context| f(ctx).map(|result| result.map(Into::into)).boxed()),
        }
    }

    /// Invokes the handler.
    pub async fn call(&self, ctx: &Context) -> AppResult<Reply> {
        (self.f)(ctx).await
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(<closure>)")
    }
}

/// A route as declared on an instance, before its chain is resolved.
#[derive(Debug, Clone)]
pub(crate) struct RouteDef {
    pub method: Method,
    pub path: String,
    pub handler: Handler,
}

/// Hooks that run for one route, split by stage, each in chain order.
#[derive(Debug, Clone, Default)]
pub struct RouteChain {
    transform: Arc<[Hook]>,
    before_handle: Arc<[Hook]>,
    after_handle: Arc<[Hook]>,
    error: Arc<[Hook]>,
    response: Arc<[Hook]>,
}

impl RouteChain {
    /// Snapshots every hook held by `registry`.
    pub fn from_registry(registry: &HookRegistry) -> Self {
        Self {
            transform: registry.of_kind(HookKind::Transform).into(),
            before_handle: registry.of_kind(HookKind::BeforeHandle).into(),
            after_handle: registry.of_kind(HookKind::AfterHandle).into(),
            error: registry.of_kind(HookKind::Error).into(),
            response: registry.of_kind(HookKind::Response).into(),
        }
    }

    /// Hooks of one stage.
    pub fn hooks(&self, kind: HookKind) -> &[Hook] {
        match kind {
            HookKind::Transform => &self.transform,
            HookKind::BeforeHandle => &self.before_handle,
            HookKind::AfterHandle => &self.after_handle,
            HookKind::Error => &self.error,
            HookKind::Response => &self.response,
        }
    }

    /// Total number of hooks across stages.
    pub fn len(&self) -> usize {
        HookKind::ALL.iter().map(|kind| self.hooks(*kind).len()).sum()
    }

    /// Returns whether the route runs no hooks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A route with its owner, frozen hook chain, and decorations.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    /// Position in the application's route table.
    pub id: RouteId,
    /// HTTP method.
    pub method: Method,
    /// Path pattern (`:name` params, trailing `*` wildcard).
    pub path: Arc<str>,
    /// Instance the route was declared on.
    pub owner: HookOrigin,
    /// The handler.
    pub handler: Handler,
    /// Hooks visible to this route.
    pub chain: RouteChain,
    /// Static properties present from the start of every request.
    pub decorations: Arc<Derived>,
}

impl CompiledRoute {
    pub(crate) fn resolve(
        def: RouteDef,
        owner: &HookOrigin,
        chain: &RouteChain,
        decorations: &Arc<Derived>,
    ) -> Self {
        Self {
            id: RouteId(0),
            method: def.method,
            path: Arc::from(def.path),
            owner: owner.clone(),
            handler: def.handler,
            chain: chain.clone(),
            decorations: Arc::clone(decorations),
        }
    }
}

impl CompiledRoute {
    /// Path with parameter names erased, so `/u/:id` and `/u/:name` compare equal.
    pub fn shape(&self) -> String {
        self.path
            .split('/')
            .map(|segment| if segment.starts_with(':') { ":" } else { segment })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Rejects patterns the transport cannot mount: relative paths, a
    /// wildcard before the last segment, and braces in static segments.
    pub(crate) fn validate(&self) -> AppResult<()> {
        if !self.path.starts_with('/') {
            return Err(AppError::validation(format!(
                "Route path '{}' declared by '{}' must start with '/'",
                self.path, self.owner
            )));
        }

        let segments: Vec<&str> = self.path.split('/').collect();
        for (index, segment) in segments.iter().enumerate() {
            if *segment == WILDCARD && index + 1 != segments.len() {
                return Err(AppError::validation(format!(
                    "Route {self} declared by '{}' has a wildcard before its last segment",
                    self.owner
                )));
            }
            if !segment.starts_with(':') && segment.contains(['{', '}']) {
                return Err(AppError::validation(format!(
                    "Route {self} declared by '{}' has a brace in segment '{segment}'",
                    self.owner
                )));
            }
        }
        Ok(())
    }

    /// Whether `self` ends in a wildcard at a position where `other`
    /// declares a parameter under the same prefix. Methods are ignored:
    /// the transport matches paths before methods.
    pub(crate) fn overlaps(&self, other: &CompiledRoute) -> bool {
        let shape = self.shape();
        let Some(prefix) = shape.strip_suffix("/*") else {
            return false;
        };
        other
            .shape()
            .strip_prefix(prefix)
            .is_some_and(|rest| rest == "/:" || rest.starts_with("/:/"))
    }
}

impl fmt::Display for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
