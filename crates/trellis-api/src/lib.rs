//! # trellis-api
//!
//! HTTP layer for Trellis built on Axum.
//!
//! Mounts a built [`App`](trellis_plugin::App) onto an Axum router, one
//! handler per compiled route, and runs it behind request logging and
//! tracing layers.

pub mod app;
pub mod error;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, run_server};
pub use error::ApiError;
pub use state::AppState;
