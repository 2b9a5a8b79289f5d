//! # trellis-plugin
//!
//! Composition engine for Trellis. Provides:
//!
//! - Instances that collect state, decorations, hooks and routes
//! - Local, scoped and global hook visibility resolved at merge time
//! - Context construction from ordered derive/transform chains
//! - A request pipeline running before-handle, handler, after-handle,
//!   error and response stages

pub mod app;
pub mod builder;
pub mod context;
pub mod hooks;
pub mod instance;
pub mod pipeline;
pub mod plugin;
pub mod prelude;
pub mod reply;
pub mod route;
pub mod store;

pub use app::App;
pub use builder::ContextBuilder;
pub use context::{Context, ContextValue, Derived, RequestInfo};
pub use hooks::{HookFn, HookKind, HookOptions, HookRegistry, ScopeResolver};
pub use instance::{Instance, InstanceOptions};
pub use pipeline::RequestPipeline;
pub use plugin::Plugin;
pub use reply::{Reply, ReplyBody};
pub use route::{CompiledRoute, Handler, RouteChain};
pub use store::Store;
