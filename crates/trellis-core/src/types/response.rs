//! Response body types shared by the pipeline and the transport adapter.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl ApiErrorResponse {
    /// Builds the body for an error, hiding 5xx messages unless `expose` is set.
    pub fn from_error(error: &AppError, expose: bool) -> Self {
        let message = if expose || !error.kind.is_server_error() {
            error.message.clone()
        } else {
            "Internal server error".to_string()
        };

        Self {
            error: error.kind.to_string(),
            message,
        }
    }
}
