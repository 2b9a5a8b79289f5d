//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::response::{IntoResponse, Response};

use trellis_core::error::AppError;
use trellis_core::types::ApiErrorResponse;

/// `AppError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.kind.is_server_error() {
            tracing::error!(kind = %self.0.kind, error = %self.0.message, "Internal server error");
        }

        let body = ApiErrorResponse::from_error(&self.0, true);
        (self.0.status_code(), Json(body)).into_response()
    }
}
