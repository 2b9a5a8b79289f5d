//! Request/response logging middleware.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

/// Declared pattern of the route that produced a response, attached by the
/// router so the access log can group requests by route.
#[derive(Debug, Clone)]
pub struct MatchedRoute(pub Arc<str>);

/// Logs method, path, matched route, status, and duration.
///
/// Server errors are logged at `warn`.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let route = response
        .extensions()
        .get::<MatchedRoute>()
        .map(|matched| Arc::clone(&matched.0));
    let route = route.as_deref().unwrap_or("-");

    if response.status().is_server_error() {
        warn!(%method, %path, route, status, elapsed_ms, "Request failed");
    } else {
        info!(%method, %path, route, status, elapsed_ms, "Request served");
    }

    response
}
