//! Route and hook return values.

use axum::Json;
use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use trellis_core::error::AppError;
use trellis_core::types::ApiErrorResponse;

/// Body of a [`Reply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    /// No body.
    Empty,
    /// Plain text.
    Text(String),
    /// JSON document.
    Json(Value),
}

/// A response value produced by a handler, a before-handle short-circuit,
/// an after-handle rewrite, or an error hook.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Response status.
    pub status: StatusCode,
    /// Extra response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: ReplyBody,
}

impl Reply {
    /// Creates a `200 OK` reply from any JSON-convertible value.
    ///
    /// Strings become text, numbers and booleans their textual form,
    /// `null` an empty body, and objects or arrays JSON.
    pub fn new(value: impl Into<Value>) -> Self {
        let body = match value.into() {
            Value::Null => ReplyBody::Empty,
            Value::String(text) => ReplyBody::Text(text),
            Value::Number(number) => ReplyBody::Text(number.to_string()),
            Value::Bool(flag) => ReplyBody::Text(flag.to_string()),
            other => ReplyBody::Json(other),
        };
        Self::with_body(body)
    }

    /// Creates a text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_body(ReplyBody::Text(text.into()))
    }

    /// Creates a JSON reply, even for scalar values.
    pub fn json(value: impl Into<Value>) -> Self {
        Self::with_body(ReplyBody::Json(value.into()))
    }

    /// Renders an error as a JSON error body with the kind's status.
    pub fn from_error(error: &AppError, expose_message: bool) -> Self {
        let body = ApiErrorResponse::from_error(error, expose_message);
        let value = serde_json::to_value(&body).unwrap_or(Value::Null);
        Self::json(value).with_status(error.status_code())
    }

    fn with_body(body: ReplyBody) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Sets the status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Returns the body as text when it is a text body.
    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            ReplyBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<i64> for Reply {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            ReplyBody::Empty => Response::new(Body::empty()),
            ReplyBody::Text(text) => text.into_response(),
            ReplyBody::Json(value) => Json(value).into_response(),
        };
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}
