use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::store::{load_object, save_object};

/// Interpreter layout of a virtual environment, as persisted in
/// `context.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenvContext {
    pub env_dir: String,
    pub env_name: String,
    /// Interpreter inside the venv.
    pub env_exe: String,
    /// Scripts folder inside the venv (`bin` or `Scripts`).
    pub bin_path: String,
    /// Folder holding the base interpreter the venv was built from.
    pub python_dir: String,
    /// Base interpreter the venv was built from.
    pub executable: String,
}

pub const CONTEXT_ENV_DIR: &str = "env_dir";
pub const CONTEXT_ENV_EXE: &str = "env_exe";
pub const CONTEXT_BIN_PATH: &str = "bin_path";
pub const CONTEXT_PYTHON_DIR: &str = "python_dir";

/// Opaque key/value view over `context.json`.
#[derive(Debug)]
pub struct ContextStore {
    path: Mutex<PathBuf>,
    values: Mutex<Map<String, Value>>,
}

impl ContextStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = load_object(&path);
        if values.is_empty() {
            debug!(path = %path.display(), "context file is empty or missing");
        }
        Self {
            path: Mutex::new(path),
            values: Mutex::new(values),
        }
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        lock(&self.path).clone()
    }

    /// Point the store at another file and load it.
    pub fn set_path(&self, path: impl Into<PathBuf>) {
        *lock(&self.path) = path.into();
        self.load();
    }

    pub fn load(&self) {
        let path = self.path();
        *lock(&self.values) = load_object(&path);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        lock(&self.values)
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    }

    #[must_use]
    pub fn path_value(&self, key: &str) -> Option<PathBuf> {
        self.value(key).map(PathBuf::from)
    }

    #[must_use]
    pub fn venv_context(&self) -> Option<VenvContext> {
        let values = Value::Object(lock(&self.values).clone());
        serde_json::from_value(values).ok()
    }

    /// Persist `context`, replacing whatever the file held.
    ///
    /// # Errors
    /// Returns an error when the context file cannot be written.
    pub fn store(&self, context: &VenvContext) -> Result<()> {
        let Value::Object(values) = serde_json::to_value(context)? else {
            anyhow::bail!("venv context did not serialize to an object");
        };
        save_object(&self.path(), &values)?;
        *lock(&self.values) = values;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
