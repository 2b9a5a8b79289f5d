//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use trellis_core::error::{AppError, ErrorKind};
pub use trellis_core::result::AppResult;
pub use trellis_core::types::Scope;

pub use crate::context::{Context, ContextValue, Derived, RequestInfo};
pub use crate::hooks::definitions::{HookKind, HookOptions};
pub use crate::hooks::handler::{
    AfterHandleHandler, BeforeHandleHandler, ErrorHandler, HookFn, ResponseHandler,
    TransformHandler,
};
pub use crate::instance::{Instance, InstanceOptions};
pub use crate::plugin::Plugin;
pub use crate::reply::Reply;
pub use crate::store::Store;
