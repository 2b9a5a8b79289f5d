//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use trellis_core::config::AppConfig;
use trellis_plugin::Instance;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Application config
    pub config: AppConfig,
}

impl TestApp {
    /// Build a test application from an instance tree with default config
    pub fn new(instance: Instance) -> Self {
        Self::with_config(instance, AppConfig::default())
    }

    /// Build a test application with explicit config
    pub fn with_config(instance: Instance, config: AppConfig) -> Self {
        let app = instance.build().expect("Failed to build instance tree");
        let router =
            trellis_api::build_app(app, config.clone()).expect("Failed to mount routes");
        Self { router, config }
    }

    /// Send a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, &[]).await
    }

    /// Send a request with extra headers
    pub async fn request(&self, method: &str, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut req = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let req = req.body(Body::empty()).expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, text, body }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Raw body text
    pub text: String,
    /// Parsed JSON body (`Null` when the body is not JSON)
    pub body: Value,
}

/// Thread-safe call log shared between hooks and assertions
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("call log poisoned").push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("call log poisoned").clone()
    }
}
