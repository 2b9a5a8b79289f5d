//! # trellis-core
//!
//! Core crate for Trellis. Contains configuration schemas, typed
//! identifiers, the hook scope tag, error response bodies, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other Trellis crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
pub use types::Scope;
