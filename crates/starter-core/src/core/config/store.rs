use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use starter_domain::FileManifest;
use tracing::warn;

pub const CONFIG_APP_FILES: &str = "app_files";
pub const CONFIG_APP_PARAMS: &str = "app_params";
pub const CONFIG_MAIN_FILE: &str = "main_file";
pub const CONFIG_APP_FOLDER: &str = "app_folder";

/// Keys that survive [`JsonConfigStore::clean`].
const KEEP_KEYS: [&str; 2] = [CONFIG_APP_FOLDER, CONFIG_MAIN_FILE];

/// What the strategies need from persisted configuration.
pub trait ConfigStore: Send + Sync {
    /// Manifest stored by the last successful install, if any.
    fn app_files(&self) -> Option<FileManifest>;
    fn set_app_files(&self, manifest: &FileManifest) -> Result<()>;
    /// Forget the stored manifest so the next run starts fresh.
    fn remove_app_files(&self) -> Result<()>;
    /// File name that overrides entry-point detection.
    fn main_file(&self) -> Option<String>;
    /// Raw argument string passed to the launched app.
    fn app_params(&self) -> Option<String>;
}

/// Config file content written for a fresh environment.
#[must_use]
pub fn default_config_content() -> Value {
    json!({
        CONFIG_APP_FILES: {},
        CONFIG_APP_FOLDER: "",
        CONFIG_APP_PARAMS: "",
        CONFIG_MAIN_FILE: "",
    })
}

/// One-level JSON object on disk, re-written after every change.
#[derive(Debug)]
pub struct JsonConfigStore {
    path: PathBuf,
    config: Mutex<Map<String, Value>>,
}

impl JsonConfigStore {
    /// Open the config at `path`. A missing file starts empty; unreadable
    /// content is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = load_object(&path);
        Self {
            path,
            config: Mutex::new(config),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, dropping in-memory state.
    pub fn reload(&self) {
        *self.lock() = load_object(&self.path);
    }

    #[must_use]
    pub fn app_folder(&self) -> Option<String> {
        self.string_value(CONFIG_APP_FOLDER)
    }

    /// # Errors
    /// Returns an error when the config file cannot be written.
    pub fn set_app_folder(&self, folder: &Path) -> Result<()> {
        self.set_value(CONFIG_APP_FOLDER, json!(folder.display().to_string()))
    }

    /// # Errors
    /// Returns an error when the config file cannot be written.
    pub fn set_app_params(&self, params: &str) -> Result<()> {
        self.set_value(CONFIG_APP_PARAMS, json!(params))
    }

    /// # Errors
    /// Returns an error when the config file cannot be written.
    pub fn set_main_file(&self, name: &str) -> Result<()> {
        self.set_value(CONFIG_MAIN_FILE, json!(name))
    }

    /// Drop everything tied to the installed app, keeping only the app
    /// folder and the main-file override.
    ///
    /// # Errors
    /// Returns an error when the config file cannot be written.
    pub fn clean(&self) -> Result<()> {
        let mut config = self.lock();
        config.retain(|key, _| KEEP_KEYS.contains(&key.as_str()));
        save_object(&self.path, &config)
    }

    fn string_value(&self, key: &str) -> Option<String> {
        self.lock()
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    }

    fn set_value(&self, key: &str, value: Value) -> Result<()> {
        let mut config = self.lock();
        config.insert(key.to_string(), value);
        save_object(&self.path, &config)
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigStore for JsonConfigStore {
    fn app_files(&self) -> Option<FileManifest> {
        let value = self.lock().get(CONFIG_APP_FILES).cloned()?;
        match serde_json::from_value::<FileManifest>(value) {
            Ok(manifest) if !manifest.is_empty() => Some(manifest),
            Ok(_) => None,
            Err(err) => {
                warn!(%err, path = %self.path.display(), "ignoring malformed app_files");
                None
            }
        }
    }

    fn set_app_files(&self, manifest: &FileManifest) -> Result<()> {
        self.set_value(CONFIG_APP_FILES, serde_json::to_value(manifest)?)
    }

    fn remove_app_files(&self) -> Result<()> {
        self.set_value(CONFIG_APP_FILES, json!({}))
    }

    fn main_file(&self) -> Option<String> {
        self.string_value(CONFIG_MAIN_FILE)
    }

    fn app_params(&self) -> Option<String> {
        self.string_value(CONFIG_APP_PARAMS)
    }
}

pub(crate) fn load_object(path: &Path) -> Map<String, Value> {
    let Ok(contents) = fs_err::read_to_string(path) else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!(path = %path.display(), "expected a JSON object, starting empty");
            Map::new()
        }
        Err(err) => {
            warn!(%err, path = %path.display(), "file is not valid JSON, starting empty");
            Map::new()
        }
    }
}

pub(crate) fn save_object(path: &Path, object: &Map<String, Value>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(object)?;
    fs_err::write(path, rendered).with_context(|| format!("failed to save {}", path.display()))
}
