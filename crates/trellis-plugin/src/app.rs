//! The finalized route table of an instance tree.

use std::sync::Arc;

use axum::http::Method;
use tracing::info;

use trellis_core::types::RouteId;

use crate::hooks::registry::HookOrigin;
use crate::route::CompiledRoute;
use crate::store::Store;

/// Routes with resolved hook chains plus the tree-wide store.
#[derive(Debug, Clone)]
pub struct App {
    root: HookOrigin,
    store: Store,
    routes: Vec<Arc<CompiledRoute>>,
}

impl App {
    pub(crate) fn new(root: HookOrigin, store: Store, routes: Vec<CompiledRoute>) -> Self {
        let routes: Vec<_> = routes
            .into_iter()
            .enumerate()
            .map(|(index, mut route)| {
                route.id = RouteId(index);
                Arc::new(route)
            })
            .collect();

        info!(
            root = %root,
            routes = routes.len(),
            store_keys = store.len(),
            "Application built"
        );

        Self { root, store, routes }
    }

    /// The root instance.
    pub fn root(&self) -> &HookOrigin {
        &self.root
    }

    /// The store shared by every route.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// All routes, indexed by [`RouteId`].
    pub fn routes(&self) -> &[Arc<CompiledRoute>] {
        &self.routes
    }

    /// Route by id.
    pub fn route(&self, id: RouteId) -> Option<&Arc<CompiledRoute>> {
        self.routes.get(id.0)
    }

    /// Finds a route by method and declared path pattern.
    pub fn find(&self, method: &Method, path: &str) -> Option<&Arc<CompiledRoute>> {
        self.routes
            .iter()
            .find(|route| route.method == *method && &*route.path == path)
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether the app has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
