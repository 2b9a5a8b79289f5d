//! Per-request execution of a compiled route.
//!
//! Stages run in a fixed order: context construction, before-handle,
//! handler, after-handle. A before-handle reply skips the rest. Any error
//! goes to the route's error hooks, and response observers see whatever
//! reply is finally returned.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use trellis_core::config::PipelineConfig;
use trellis_core::error::AppError;
use trellis_core::result::AppResult;
use trellis_core::types::RouteId;

use crate::app::App;
use crate::builder::ContextBuilder;
use crate::context::{Context, RequestInfo};
use crate::hooks::definitions::HookKind;
use crate::hooks::handler::HookFn;
use crate::reply::Reply;
use crate::route::CompiledRoute;

/// Runs requests through compiled routes. Shared across concurrent requests.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    app: Arc<App>,
    builder: ContextBuilder,
    expose_errors: bool,
}

impl RequestPipeline {
    /// Creates a pipeline with default settings.
    pub fn new(app: App) -> Self {
        Self::from_config(app, &PipelineConfig::default())
    }

    /// Creates a pipeline from configuration.
    pub fn from_config(app: App, config: &PipelineConfig) -> Self {
        Self {
            app: Arc::new(app),
            builder: ContextBuilder::new(config.hook_timeout()),
            expose_errors: config.expose_error_messages,
        }
    }

    /// The application being served.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Handles one request against the route `id`.
    ///
    /// Always produces a reply: failures become error replies.
    pub async fn handle(&self, id: RouteId, request: RequestInfo) -> Reply {
        let Some(route) = self.app.route(id) else {
            let err = AppError::not_found(format!("No route registered as {id}"));
            return Reply::from_error(&err, self.expose_errors);
        };

        let started = Instant::now();
        let mut ctx = ContextBuilder::initial(route, request, self.app.store().clone());

        let reply = match self.run_stages(route, &mut ctx).await {
            Ok(reply) => reply,
            Err(err) => self.handle_error(route, &ctx, err).await,
        };

        self.notify_response(route, &ctx, &reply).await;

        debug!(
            route = %route,
            path = %ctx.path(),
            received_at = %ctx.request().received_at.to_rfc3339(),
            status = reply.status.as_u16(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Request handled"
        );
        reply
    }

    async fn run_stages(&self, route: &CompiledRoute, ctx: &mut Context) -> AppResult<Reply> {
        self.builder.build(ctx, route).await?;

        for hook in route.chain.hooks(HookKind::BeforeHandle) {
            let HookFn::BeforeHandle(handler) = &hook.func else {
                continue;
            };
            if let Some(reply) = self.builder.bounded(hook, handler.before_handle(ctx)).await? {
                info!(
                    route = %route,
                    origin = %hook.origin,
                    status = reply.status.as_u16(),
                    "Before-handle hook short-circuited request"
                );
                return Ok(reply);
            }
        }

        let mut reply = route.handler.call(ctx).await?;

        for hook in route.chain.hooks(HookKind::AfterHandle) {
            let HookFn::AfterHandle(handler) = &hook.func else {
                continue;
            };
            if let Some(next) = self.builder.bounded(hook, handler.after_handle(ctx, &reply)).await? {
                debug!(route = %route, origin = %hook.origin, "After-handle hook replaced reply");
                reply = next;
            }
        }

        Ok(reply)
    }

    async fn handle_error(&self, route: &CompiledRoute, ctx: &Context, err: AppError) -> Reply {
        if err.kind.is_server_error() {
            error!(route = %route, kind = %err.kind, error = %err, "Request failed");
        } else {
            warn!(route = %route, kind = %err.kind, error = %err, "Request rejected");
        }

        for hook in route.chain.hooks(HookKind::Error) {
            let HookFn::Error(handler) = &hook.func else {
                continue;
            };
            let handled = self
                .builder
                .bounded(hook, async { Ok(handler.on_error(ctx, &err).await) })
                .await;
            match handled {
                Ok(Some(reply)) => {
                    debug!(route = %route, origin = %hook.origin, "Error hook produced reply");
                    return reply;
                }
                Ok(None) => {}
                Err(failure) => {
                    warn!(route = %route, origin = %hook.origin, error = %failure, "Error hook failed");
                }
            }
        }

        Reply::from_error(&err, self.expose_errors)
    }

    async fn notify_response(&self, route: &CompiledRoute, ctx: &Context, reply: &Reply) {
        for hook in route.chain.hooks(HookKind::Response) {
            let HookFn::Response(handler) = &hook.func else {
                continue;
            };
            if let Err(err) = self.builder.bounded(hook, handler.on_response(ctx, reply)).await {
                warn!(
                    route = %route,
                    origin = %hook.origin,
                    error = %err,
                    "Response hook failed"
                );
            }
        }
    }
}
