//! Launcher settings and the persisted config/context stores.

pub mod context;
pub mod settings;
pub mod store;

pub use context::{ContextStore, VenvContext};
pub use settings::*;
pub use store::{ConfigStore, JsonConfigStore};
