//! Hook system: kinds, handler traits, the per-instance registry, and
//! merge-time scope resolution.

pub mod definitions;
pub mod handler;
pub mod registry;
pub mod resolver;

pub use definitions::{HookKind, HookOptions};
pub use handler::{
    AfterHandleHandler, BeforeHandleHandler, ErrorHandler, HookFn, ResponseHandler,
    TransformHandler,
};
pub use registry::{Hook, HookOrigin, HookRegistry};
pub use resolver::ScopeResolver;
