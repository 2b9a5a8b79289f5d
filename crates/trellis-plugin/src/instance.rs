//! Application and plugin instances.
//!
//! An [`Instance`] collects state, decorations, hooks and routes. Merging
//! a child with [`Instance::use_plugin`] freezes the child's own routes
//! against the child's registry, hands the child's inheritable hooks to
//! the parent, and folds the child's store and decorations into the
//! parent's. The root instance becomes an [`App`] with [`Instance::build`].

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use trellis_core::config::PipelineConfig;
use trellis_core::error::AppError;
use trellis_core::result::AppResult;
use trellis_core::types::{InstanceId, Scope};

use crate::app::App;
use crate::context::{Context, ContextValue, Derived};
use crate::hooks::definitions::HookOptions;
use crate::hooks::handler::HookFn;
use crate::hooks::registry::{HookOrigin, HookRegistry};
use crate::hooks::resolver::ScopeResolver;
use crate::plugin::Plugin;
use crate::reply::Reply;
use crate::route::{CompiledRoute, Handler, RouteChain, RouteDef};
use crate::store::Store;

/// Construction options for an [`Instance`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceOptions {
    /// Plugin name used for deduplication. Unnamed instances are never deduplicated.
    pub name: Option<String>,
    /// Scope applied to hooks registered without an explicit one.
    pub default_scope: Scope,
}

impl InstanceOptions {
    /// Options taking the default scope from pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            name: None,
            default_scope: config.default_scope,
        }
    }

    /// Sets the plugin name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A composable application or plugin.
#[derive(Debug)]
pub struct Instance {
    origin: HookOrigin,
    named: bool,
    default_scope: Scope,
    store: Store,
    decorations: Derived,
    hooks: HookRegistry,
    routes: Vec<RouteDef>,
    mounted: Vec<CompiledRoute>,
    plugins: HashSet<String>,
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

impl Instance {
    /// Creates an unnamed instance with global default scope.
    pub fn new() -> Self {
        Self::with_options(InstanceOptions::default())
    }

    /// Creates a named instance. A parent merges a given name once.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_options(InstanceOptions::default().named(name))
    }

    /// Creates an instance from options.
    pub fn with_options(options: InstanceOptions) -> Self {
        let id = InstanceId::new();
        let named = options.name.is_some();
        let name = options
            .name
            .unwrap_or_else(|| format!("instance-{}", &id.to_string()[..8]));

        Self {
            origin: HookOrigin {
                id,
                name: Arc::from(name),
            },
            named,
            default_scope: options.default_scope,
            store: Store::new(),
            decorations: Derived::new(),
            hooks: HookRegistry::new(),
            routes: Vec::new(),
            mounted: Vec::new(),
            plugins: HashSet::new(),
        }
    }

    /// Instance identifier.
    pub fn id(&self) -> InstanceId {
        self.origin.id
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.origin.name
    }

    /// Scope used when a registration gives none.
    pub fn default_scope(&self) -> Scope {
        self.default_scope
    }

    /// The instance's store. After a merge the parent's store holds every key.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Hooks visible to routes declared on this instance.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Returns whether a plugin with `name` has been merged, directly or transitively.
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains(name)
    }

    /// Seeds a store entry. An existing value is kept.
    pub fn state(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !self.store.seed(key.clone(), value) {
            debug!(instance = %self.origin, key = %key, "State key already present, keeping existing value");
        }
        self
    }

    /// Adds a static property present in every request context from the start.
    ///
    /// The first decoration under a key wins.
    pub fn decorate(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        let key = key.into();
        if self.decorations.get(&key).is_none() {
            self.decorations.insert(key, value.into());
        }
        self
    }

    /// Registers a derive function with the default scope.
    pub fn derive<F, Fut>(self, f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Derived>> + Send + 'static,
    {
        self.derive_with(HookOptions::default(), f)
    }

    /// Registers a derive function with explicit options.
    pub fn derive_with<F, Fut>(self, options: HookOptions, f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Derived>> + Send + 'static,
    {
        self.register_hooks(options, [HookFn::derive(f)])
    }

    /// Registers a transform function. Transforms share the derive chain.
    pub fn transform<F, Fut>(self, f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Derived>> + Send + 'static,
    {
        self.derive_with(HookOptions::default(), f)
    }

    /// Registers a transform function with explicit options.
    pub fn transform_with<F, Fut>(self, options: HookOptions, f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Derived>> + Send + 'static,
    {
        self.derive_with(options, f)
    }

    /// Registers a before-handle hook with the default scope.
    pub fn on_before_handle<F, Fut>(self, f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<Reply>>> + Send + 'static,
    {
        self.on_before_handle_with(HookOptions::default(), f)
    }

    /// Registers a before-handle hook with explicit options.
    pub fn on_before_handle_with<F, Fut>(self, options: HookOptions, f: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<Reply>>> + Send + 'static,
    {
        self.register_hooks(options, [HookFn::before_handle(f)])
    }

    /// Registers an after-handle hook with the default scope.
    pub fn on_after_handle<F, Fut>(self, f: F) -> Self
    where
        F: Fn(&Context, &Reply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<Reply>>> + Send + 'static,
    {
        self.on_after_handle_with(HookOptions::default(), f)
    }

    /// Registers an after-handle hook with explicit options.
    pub fn on_after_handle_with<F, Fut>(self, options: HookOptions, f: F) -> Self
    where
        F: Fn(&Context, &Reply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<Reply>>> + Send + 'static,
    {
        self.register_hooks(options, [HookFn::after_handle(f)])
    }

    /// Registers an error hook with the default scope.
    pub fn on_error<F, Fut>(self, f: F) -> Self
    where
        F: Fn(&Context, &AppError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Reply>> + Send + 'static,
    {
        self.on_error_with(HookOptions::default(), f)
    }

    /// Registers an error hook with explicit options.
    pub fn on_error_with<F, Fut>(self, options: HookOptions, f: F) -> Self
    where
        F: Fn(&Context, &AppError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Reply>> + Send + 'static,
    {
        self.register_hooks(options, [HookFn::error(f)])
    }

    /// Registers a response observer with the default scope.
    pub fn on_response<F, Fut>(self, f: F) -> Self
    where
        F: Fn(&Context, &Reply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.on_response_with(HookOptions::default(), f)
    }

    /// Registers a response observer with explicit options.
    pub fn on_response_with<F, Fut>(self, options: HookOptions, f: F) -> Self
    where
        F: Fn(&Context, &Reply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.register_hooks(options, [HookFn::response(f)])
    }

    /// Registers an ordered collection of hooks sharing one set of options.
    ///
    /// Equivalent to registering each element in order.
    pub fn register_hooks<I>(mut self, options: HookOptions, funcs: I) -> Self
    where
        I: IntoIterator<Item = HookFn>,
    {
        let scope = options.resolve(self.default_scope);
        self.hooks.register_all(funcs, scope, &self.origin);
        self
    }

    /// Declares a route.
    pub fn route<F, Fut, R>(mut self, method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        let path = path.into();
        debug!(instance = %self.origin, method = %method, path = %path, "Route declared");
        self.routes.push(RouteDef {
            method,
            path,
            handler: Handler::new(handler),
        });
        self
    }

    /// Declares a `GET` route.
    pub fn get<F, Fut, R>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.route(Method::GET, path, handler)
    }

    /// Declares a `POST` route.
    pub fn post<F, Fut, R>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.route(Method::POST, path, handler)
    }

    /// Declares a `PUT` route.
    pub fn put<F, Fut, R>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.route(Method::PUT, path, handler)
    }

    /// Declares a `PATCH` route.
    pub fn patch<F, Fut, R>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.route(Method::PATCH, path, handler)
    }

    /// Declares a `DELETE` route.
    pub fn delete<F, Fut, R>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.route(Method::DELETE, path, handler)
    }

    /// Merges a child instance into this one.
    ///
    /// The child's own routes keep the hooks the child sees now. Its
    /// inheritable hooks are appended after this instance's hooks, its
    /// store entries and decorations are copied where absent. A named
    /// child already merged here is skipped.
    pub fn use_plugin(mut self, child: Instance) -> Self {
        if child.named && self.plugins.contains(child.name()) {
            debug!(
                parent = %self.origin,
                plugin = %child.origin,
                "Plugin already merged, skipping"
            );
            return self;
        }

        let Instance {
            origin,
            named,
            store,
            decorations,
            hooks,
            routes,
            mounted,
            plugins,
            ..
        } = child;

        let chain = RouteChain::from_registry(&hooks);
        let frozen = Arc::new(decorations.clone());
        let own_routes = routes.len();

        let inherited = ScopeResolver::inherit(&mut self.hooks, &hooks);
        let absorbed = self.store.absorb(&store);
        self.decorations.absorb(&decorations);

        self.mounted.extend(mounted);
        self.mounted.extend(
            routes
                .into_iter()
                .map(|def| CompiledRoute::resolve(def, &origin, &chain, &frozen)),
        );

        self.plugins.extend(plugins);
        if named {
            self.plugins.insert(origin.name.to_string());
        }

        info!(
            parent = %self.origin,
            plugin = %origin,
            inherited_hooks = inherited,
            store_keys = absorbed,
            routes = own_routes,
            "Instance merged"
        );
        self
    }

    /// Applies a functional plugin to this instance.
    pub fn apply<F>(self, f: F) -> Self
    where
        F: FnOnce(Instance) -> Instance,
    {
        f(self)
    }

    /// Installs a [`Plugin`] as a named child instance.
    pub fn install<P>(self, plugin: &P) -> Self
    where
        P: Plugin + ?Sized,
    {
        let child = Instance::with_options(InstanceOptions {
            name: Some(plugin.name().to_string()),
            default_scope: self.default_scope,
        });
        self.use_plugin(plugin.install(child))
    }

    /// Finalizes the route table.
    ///
    /// Fails with `Validation` when a path is relative or has a wildcard
    /// before its last segment, and with `Conflict` when two routes share
    /// a method and path shape or a wildcard overlaps a parameter.
    pub fn build(self) -> AppResult<App> {
        let Instance {
            origin,
            store,
            decorations,
            hooks,
            routes,
            mut mounted,
            ..
        } = self;

        let chain = RouteChain::from_registry(&hooks);
        let decorations = Arc::new(decorations);
        mounted.extend(
            routes
                .into_iter()
                .map(|def| CompiledRoute::resolve(def, &origin, &chain, &decorations)),
        );

        let mut seen: HashMap<(Method, String), &CompiledRoute> = HashMap::new();
        for route in &mounted {
            route.validate()?;
            if let Some(first) = seen.insert((route.method.clone(), route.shape()), route) {
                return Err(AppError::conflict(format!(
                    "Route {route} declared by '{}' conflicts with {first} declared by '{}'",
                    route.owner, first.owner
                )));
            }
        }

        for (index, route) in mounted.iter().enumerate() {
            if let Some(other) = mounted[index + 1..]
                .iter()
                .find(|other| route.overlaps(other) || other.overlaps(route))
            {
                return Err(AppError::conflict(format!(
                    "Wildcard route {route} declared by '{}' overlaps the parameter of {other} declared by '{}'",
                    route.owner, other.owner
                )));
            }
        }

        Ok(App::new(origin, store, mounted))
    }
}
