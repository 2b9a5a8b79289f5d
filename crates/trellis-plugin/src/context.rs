//! Per-request context and the property maps hooks contribute to it.
//!
//! A [`Context`] is created fresh for each request from its [`RequestInfo`],
//! the tree-wide [`Store`], and the route's decorations. Transform-family
//! hooks return [`Derived`] maps that are merged in order, later keys
//! overwriting earlier ones.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use trellis_core::error::AppError;
use trellis_core::result::AppResult;

use crate::store::Store;

/// Callable context property contributed by a hook.
pub type DerivedFn = Arc<dyn Fn(&[Value]) -> AppResult<Value> + Send + Sync>;

/// A single context property: plain data or a callable.
#[derive(Clone)]
pub enum ContextValue {
    /// JSON data.
    Value(Value),
    /// A function the handler or later hooks can call.
    Func(DerivedFn),
}

impl ContextValue {
    /// Returns the JSON data, if this is not a function.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Func(_) => None,
        }
    }

    /// Returns whether this property is callable.
    pub fn is_func(&self) -> bool {
        matches!(self, Self::Func(_))
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Func(_) => f.write_str("Func(<closure>)"),
        }
    }
}

impl<T: Into<Value>> From<T> for ContextValue {
    fn from(value: T) -> Self {
        Self::Value(value.into())
    }
}

/// Ordered set of properties returned by a transform-family hook.
#[derive(Debug, Clone, Default)]
pub struct Derived {
    entries: Vec<(String, ContextValue)>,
}

impl Derived {
    /// Creates an empty map; returning it contributes no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a data property.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, ContextValue::Value(value.into()));
        self
    }

    /// Adds a callable property.
    pub fn with_fn<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> AppResult<Value> + Send + Sync + 'static,
    {
        self.insert(key, ContextValue::Func(Arc::new(f)));
        self
    }

    /// Adds a property, replacing an earlier one with the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: ContextValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the property under `key`.
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Returns whether no properties were contributed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Copies entries of `other` whose keys are absent here. Returns the count.
    pub fn absorb(&mut self, other: &Derived) -> usize {
        let mut copied = 0;
        for (key, value) in &other.entries {
            if self.get(key).is_none() {
                self.entries.push((key.clone(), value.clone()));
                copied += 1;
            }
        }
        copied
    }
}

impl From<Map<String, Value>> for Derived {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, value)| (key, ContextValue::Value(value)))
                .collect(),
        }
    }
}

impl IntoIterator for Derived {
    type Item = (String, ContextValue);
    type IntoIter = std::vec::IntoIter<(String, ContextValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Request metadata handed over by the transport adapter.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Path parameters extracted by the router.
    pub params: HashMap<String, String>,
    /// When the request entered the pipeline.
    pub received_at: DateTime<Utc>,
}

impl RequestInfo {
    /// Creates request metadata for a method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            params: HashMap::new(),
            received_at: Utc::now(),
        }
    }

    /// Builds request metadata from HTTP request parts and router params.
    pub fn from_parts(parts: &Parts, params: HashMap<String, String>) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            params,
            received_at: Utc::now(),
        }
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

    /// Adds a path parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// The composed per-request context handed to hooks and route handlers.
#[derive(Debug, Clone)]
pub struct Context {
    request: Arc<RequestInfo>,
    store: Store,
    route: Arc<str>,
    values: HashMap<String, ContextValue>,
}

impl Context {
    /// Creates a context holding only request metadata and the store.
    pub fn new(request: RequestInfo, store: Store) -> Self {
        let route: Arc<str> = Arc::from(request.path.as_str());
        Self {
            request: Arc::new(request),
            store,
            route,
            values: HashMap::new(),
        }
    }

    /// Sets the route pattern the request matched.
    pub fn with_route(mut self, pattern: Arc<str>) -> Self {
        self.route = pattern;
        self
    }

    /// Request metadata.
    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.request.method
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Raw query string.
    pub fn query(&self) -> Option<&str> {
        self.request.query.as_deref()
    }

    /// Header value as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// Path parameter extracted by the router.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.params.get(name).map(String::as_str)
    }

    /// Route pattern the request matched.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// The tree-wide store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the property under `key`.
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Returns whether `key` has been contributed.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the data property under `key`.
    pub fn value(&self, key: &str) -> AppResult<&Value> {
        match self.values.get(key) {
            Some(ContextValue::Value(value)) => Ok(value),
            Some(ContextValue::Func(_)) => Err(AppError::context(format!(
                "Context key '{key}' is a function, not a value"
            ))),
            None => Err(missing(key)),
        }
    }

    /// Returns the data property under `key` as text.
    pub fn value_str(&self, key: &str) -> AppResult<&str> {
        self.value(key)?
            .as_str()
            .ok_or_else(|| AppError::context(format!("Context key '{key}' is not a string")))
    }

    /// Calls the function property under `key`.
    pub fn call(&self, key: &str, args: &[Value]) -> AppResult<Value> {
        match self.values.get(key) {
            Some(ContextValue::Func(f)) => f(args),
            Some(ContextValue::Value(_)) => Err(AppError::context(format!(
                "Context key '{key}' is a value, not a function"
            ))),
            None => Err(missing(key)),
        }
    }

    /// Contributed keys in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Sets a single property.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Merges a hook's contribution; existing keys are overwritten.
    pub fn merge(&mut self, derived: Derived) -> usize {
        let mut merged = 0;
        for (key, value) in derived {
            self.values.insert(key, value);
            merged += 1;
        }
        merged
    }
}

fn missing(key: &str) -> AppError {
    AppError::context(format!("Context key '{key}' was never derived"))
}
