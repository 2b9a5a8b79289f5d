//! Application builder: mounts the route table and runs the HTTP server.

use std::future::IntoFuture;
use std::time::Duration;

use axum::Router;
use tokio::sync::watch;
use tracing::{error, info, warn};

use trellis_core::config::AppConfig;
use trellis_core::error::AppError;
use trellis_plugin::App;

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application for a built instance tree.
pub fn build_app(app: App, config: AppConfig) -> Result<Router, AppError> {
    build_router(AppState::new(app, &config.pipeline))
}

/// Serves `app` until Ctrl+C or SIGTERM, then drains in-flight requests for at most
/// `server.shutdown_grace_seconds`.
pub async fn run_server(config: AppConfig, app: App) -> Result<(), AppError> {
    info!("Starting Trellis server...");

    let addr = config.server.bind_address();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let router = build_app(app, config)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Trellis server listening on {}", addr);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let deadline = async move {
        if shutdown_rx.changed().await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|e| AppError::internal(format!("Server error: {}", e)))?;
        }
        _ = deadline => {
            warn!(grace_seconds = grace.as_secs(), "Shutdown grace period elapsed, closing open connections");
        }
    }

    info!("Trellis server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
