//! Internal implementation modules for `starter-core`.
//!
//! Callers normally go through the re-exports at the crate root.

pub mod app;
pub mod config;
pub(crate) mod fs;
pub mod layout;
pub mod runtime;
pub mod tooling;
