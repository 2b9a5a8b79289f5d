//! Shared application state for Axum handlers.

use std::sync::Arc;

use trellis_core::config::PipelineConfig;
use trellis_plugin::{App, RequestPipeline};

/// State cloned into every route handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Request pipeline over the built route table
    pub pipeline: Arc<RequestPipeline>,
}

impl AppState {
    /// Wraps a built app with the given pipeline settings.
    pub fn new(app: App, config: &PipelineConfig) -> Self {
        Self {
            pipeline: Arc::new(RequestPipeline::from_config(app, config)),
        }
    }
}
