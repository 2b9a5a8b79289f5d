//! Core type definitions used across the Trellis workspace.

pub mod id;
pub mod response;
pub mod scope;

pub use id::*;
pub use response::ApiErrorResponse;
pub use scope::Scope;
