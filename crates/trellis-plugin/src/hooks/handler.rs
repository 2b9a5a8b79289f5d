//! Hook handler traits and closure adapters.
//!
//! Each lifecycle stage has its own handler trait. Plugin authors either
//! implement the trait on a struct or pass a closure, which is wrapped in
//! the matching `*Fn` adapter. A closure receives borrowed inputs and
//! returns a `'static` future, so anything it needs across an `.await`
//! must be cloned out of the context first.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use trellis_core::error::AppError;
use trellis_core::result::AppResult;

use super::definitions::HookKind;
use crate::context::{Context, Derived};
use crate::reply::Reply;

/// Transform-family hook: contributes properties to the context.
#[async_trait]
pub trait TransformHandler: Send + Sync {
    /// Returns the properties to merge into the context.
    async fn transform(&self, ctx: &Context) -> AppResult<Derived>;
}

/// Before-handle hook: returning a reply skips the handler.
#[async_trait]
pub trait BeforeHandleHandler: Send + Sync {
    /// Returns `Some(reply)` to end the request early.
    async fn before_handle(&self, ctx: &Context) -> AppResult<Option<Reply>>;
}

/// After-handle hook: may replace the reply produced so far.
#[async_trait]
pub trait AfterHandleHandler: Send + Sync {
    /// Returns `Some(reply)` to replace `reply`, `None` to keep it.
    async fn after_handle(&self, ctx: &Context, reply: &Reply) -> AppResult<Option<Reply>>;
}

/// Error hook: may turn a failure into a reply.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Returns `Some(reply)` to handle the error.
    async fn on_error(&self, ctx: &Context, error: &AppError) -> Option<Reply>;
}

/// Response hook: observes the final reply.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    /// Called once the reply is final. Failures are logged only.
    async fn on_response(&self, ctx: &Context, reply: &Reply) -> AppResult<()>;
}

/// Defines a closure adapter implementing one of the handler traits.
macro_rules! closure_hook {
    (
        $(#[$meta:meta])*
        $name:ident => $handler:ident::$method:ident($($arg:ident: $ty:ty),*) -> $out:ty
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            f: Arc<dyn Fn($($ty),*) -> BoxFuture<'static, $out> + Send + Sync>,
        }

        impl $name {
            /// Wraps a closure returning a `'static` future.
            pub fn new<F, Fut>(f: F) -> Self
            where
                F: Fn($($ty),*) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = $out> + Send + 'static,
            {
                Self {
                    f: Arc::new(move |$($arg: $ty),*| f($($arg),*).boxed()),
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("f", &"<closure>")
                    .finish()
            }
        }

        #[async_trait]
        impl $handler for $name {
            async fn $method(&self, $($arg: $ty),*) -> $out {
                (self.f)($($arg),*).await
            }
        }
    };
}

closure_hook!(
    /// Closure-backed [`TransformHandler`].
    TransformFn => TransformHandler::transform(ctx: &Context) -> AppResult<Derived>
);

closure_hook!(
    /// Closure-backed [`BeforeHandleHandler`].
    BeforeHandleFn => BeforeHandleHandler::before_handle(ctx: &Context) -> AppResult<Option<Reply>>
);

closure_hook!(
    /// Closure-backed [`AfterHandleHandler`].
    AfterHandleFn => AfterHandleHandler::after_handle(ctx: &Context, reply: &Reply) -> AppResult<Option<Reply>>
);

closure_hook!(
    /// Closure-backed [`ErrorHandler`].
    ErrorFn => ErrorHandler::on_error(ctx: &Context, error: &AppError) -> Option<Reply>
);

closure_hook!(
    /// Closure-backed [`ResponseHandler`].
    ResponseFn => ResponseHandler::on_response(ctx: &Context, reply: &Reply) -> AppResult<()>
);

/// A hook function tagged with the stage it runs in.
///
/// Registration calls normalize a single function or an ordered
/// collection into `HookFn`s before they reach the registry.
#[derive(Clone)]
pub enum HookFn {
    /// Transform family.
    Transform(Arc<dyn TransformHandler>),
    /// Before-handle stage.
    BeforeHandle(Arc<dyn BeforeHandleHandler>),
    /// After-handle stage.
    AfterHandle(Arc<dyn AfterHandleHandler>),
    /// Error stage.
    Error(Arc<dyn ErrorHandler>),
    /// Response stage.
    Response(Arc<dyn ResponseHandler>),
}

impl HookFn {
    /// Returns the stage this function runs in.
    pub fn kind(&self) -> HookKind {
        match self {
            Self::Transform(_) => HookKind::Transform,
            Self::BeforeHandle(_) => HookKind::BeforeHandle,
            Self::AfterHandle(_) => HookKind::AfterHandle,
            Self::Error(_) => HookKind::Error,
            Self::Response(_) => HookKind::Response,
        }
    }

    /// Transform-family hook whose returned properties are merged.
    pub fn derive<F, Fut>(f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Derived>> + Send + 'static,
    {
        Self::Transform(Arc::new(TransformFn::new(f)))
    }

    /// Before-handle hook.
    pub fn before_handle<F, Fut>(f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<Reply>>> + Send + 'static,
    {
        Self::BeforeHandle(Arc::new(BeforeHandleFn::new(f)))
    }

    /// After-handle hook.
    pub fn after_handle<F, Fut>(f: F) -> Self
    where
        F: Fn(&Context, &Reply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<Reply>>> + Send + 'static,
    {
        Self::AfterHandle(Arc::new(AfterHandleFn::new(f)))
    }

    /// Error hook.
    pub fn error<F, Fut>(f: F) -> Self
    where
        F: Fn(&Context, &AppError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Reply>> + Send + 'static,
    {
        Self::Error(Arc::new(ErrorFn::new(f)))
    }

    /// Response hook.
    pub fn response<F, Fut>(f: F) -> Self
    where
        F: Fn(&Context, &Reply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        Self::Response(Arc::new(ResponseFn::new(f)))
    }
}

impl fmt::Debug for HookFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookFn({})", self.kind())
    }
}
