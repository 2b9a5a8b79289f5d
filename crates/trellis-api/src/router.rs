//! Mounts a built route table onto an Axum router.
//!
//! Route patterns use `:name` parameters and a trailing `*` wildcard.
//! Each compiled route gets its own Axum handler that forwards the request
//! to the pipeline under the route's id.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Request, State};
use axum::http::Uri;
use axum::middleware as axum_middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, on};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use trellis_core::error::AppError;
use trellis_core::result::AppResult;
use trellis_core::types::RouteId;
use trellis_plugin::RequestInfo;
use trellis_plugin::route::WILDCARD;

use crate::error::ApiError;
use crate::middleware;
use crate::middleware::logging::MatchedRoute;
use crate::state::AppState;

/// Axum capture name of a trailing wildcard.
const WILDCARD_CAPTURE: &str = "wildcard";

/// Maps Axum capture names back to the names a route declared.
type ParamNames = Arc<[(String, String)]>;

/// Build the complete Axum router for every route in the pipeline's app.
pub fn build_router(state: AppState) -> AppResult<Router> {
    let app = state.pipeline.app();
    let mut by_path: BTreeMap<String, MethodRouter<AppState>> = BTreeMap::new();

    for route in app.routes() {
        let filter = MethodFilter::try_from(route.method.clone()).map_err(|_| {
            AppError::validation(format!("Unsupported method {} for route {}", route.method, route.path))
        })?;
        let id = route.id;
        let pattern = Arc::clone(&route.path);
        let names = param_names(&route.path);
        let handler = move |State(state): State<AppState>,
                            captures: Option<Path<HashMap<String, String>>>,
                            request: Request| {
            let names = Arc::clone(&names);
            let pattern = Arc::clone(&pattern);
            async move {
                let captures = captures.map(|Path(captures)| captures).unwrap_or_default();
                let mut response = dispatch(state, id, rename_params(&names, captures), request).await;
                response.extensions_mut().insert(MatchedRoute(pattern));
                response
            }
        };

        let axum_path = to_axum_path(&route.path);
        debug!(route = %route, axum_path = %axum_path, "Mounting route");
        let method_router = match by_path.remove(&axum_path) {
            Some(existing) => existing.on(filter, handler),
            None => on(filter, handler),
        };
        by_path.insert(axum_path, method_router);
    }

    info!(root = %app.root(), routes = app.len(), paths = by_path.len(), "Route table mounted");

    let router = by_path
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| router.route(&path, method_router));

    Ok(router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state))
}

async fn dispatch(state: AppState, id: RouteId, params: HashMap<String, String>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let info = RequestInfo::from_parts(&parts, params);
    state.pipeline.handle(id, info).await.into_response()
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError(AppError::not_found(format!("No route for {}", uri.path())))
}

/// Converts `/users/:id/*` into Axum's `/users/{p2}/{*wildcard}` syntax.
///
/// Parameters are named by position so patterns that differ only in
/// parameter names share one Axum route.
pub fn to_axum_path(pattern: &str) -> String {
    pattern
        .split('/')
        .enumerate()
        .map(|(index, segment)| {
            if segment.starts_with(':') {
                format!("{{p{index}}}")
            } else if segment == WILDCARD {
                format!("{{*{WILDCARD_CAPTURE}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Pairs each Axum capture of `pattern` with its declared name.
/// The wildcard is exposed under `*`.
fn param_names(pattern: &str) -> ParamNames {
    pattern
        .split('/')
        .enumerate()
        .filter_map(|(index, segment)| {
            if let Some(name) = segment.strip_prefix(':') {
                Some((format!("p{index}"), name.to_string()))
            } else if segment == WILDCARD {
                Some((WILDCARD_CAPTURE.to_string(), WILDCARD.to_string()))
            } else {
                None
            }
        })
        .collect()
}

fn rename_params(names: &[(String, String)], mut captures: HashMap<String, String>) -> HashMap<String, String> {
    names
        .iter()
        .filter_map(|(capture, declared)| captures.remove(capture).map(|value| (declared.clone(), value)))
        .collect()
}
