//! Trellis Server
//!
//! Main entry point: loads configuration, composes the demo instance tree,
//! and starts the HTTP server.

use std::time::Instant;

use futures::future::ready;
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

use trellis_core::config::AppConfig;
use trellis_core::error::AppError;
use trellis_plugin::prelude::*;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` files and `TRELLIS__*` variables
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("TRELLIS_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Trellis v{}", env!("CARGO_PKG_VERSION"));

    let root = Instance::with_options(InstanceOptions::from_config(&config.pipeline));
    let app = demo(root).build()?;

    trellis_api::run_server(config, app).await
}

/// Request timing for routes declared on the instance it is applied to.
fn timing(instance: Instance) -> Instance {
    instance
        .derive_with(HookOptions::scope(Scope::Global), |_: &Context| {
            ready(Ok(Derived::new().with_fn("elapsed_us", {
                let started = Instant::now();
                move |_: &[serde_json::Value]| Ok(json!(started.elapsed().as_micros() as u64))
            })))
        })
        .on_response_with(HookOptions::scope(Scope::Global), |ctx: &Context, reply: &Reply| {
            let elapsed = ctx.call("elapsed_us", &[]).ok();
            tracing::info!(
                route = %ctx.route(),
                status = reply.status.as_u16(),
                elapsed_us = ?elapsed,
                "Route completed"
            );
            ready(Ok(()))
        })
}

/// Visit counter stored in the shared store.
fn counter() -> Instance {
    Instance::named("counter")
        .state("visits", 0)
        .derive_with(HookOptions::scope(Scope::Scoped), |ctx: &Context| {
            ready(ctx.store().increment("visits", 1).map(|n| Derived::new().with_value("visit", n)))
        })
        .get("/visits", |ctx: &Context| ready(ctx.store().get("visits").ok_or_else(|| AppError::context("visits missing"))))
}

/// Caller name taken from the `name` header.
fn greeting() -> Instance {
    Instance::named("greeting")
        .decorate("greeting", "Hello")
        .derive_with(HookOptions::scope(Scope::Local), |ctx: &Context| {
            let name = ctx.header("name").unwrap_or("stranger").to_string();
            ready(Ok(Derived::new().with_value("name", name)))
        })
        .get("/hello", |ctx: &Context| {
            let reply = match (ctx.value_str("greeting"), ctx.value_str("name")) {
                (Ok(greeting), Ok(name)) => Ok(format!("{greeting}, {name}")),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            ready(reply)
        })
}

fn demo(root: Instance) -> Instance {
    root.apply(timing)
        .use_plugin(counter())
        .use_plugin(greeting())
        .on_error(|_: &Context, err: &AppError| {
            ready(Some(Reply::json(json!({ "error": err.kind.to_string() })).with_status(err.status_code())))
        })
        .get("/", |ctx: &Context| {
            let visit = ctx.value("visit").cloned().unwrap_or_default();
            ready(Ok(json!({ "service": "trellis", "visit": visit })))
        })
}
