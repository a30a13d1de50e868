//! On-disk working-folder layout:
//!
//! ```text
//! <root>/app_environment/
//!     app_venv/                 virtual environment
//!     app_starter_config.json   persisted config
//!     context.json              venv context
//!     app/                      default app folder
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::store::default_config_content;
use crate::fs::remove_path;

pub const APP_ENVIRONMENT_FOLDER: &str = "app_environment";
pub const VENV_FOLDER_NAME: &str = "app_venv";
pub const CONFIG_FILE_NAME: &str = "app_starter_config.json";
pub const CONTEXT_FILE_NAME: &str = "context.json";
pub const APP_DEFAULT_FOLDER: &str = "app";

#[derive(Debug, Clone)]
pub struct EnvironmentLayout {
    root: PathBuf,
    app_folder: PathBuf,
}

impl EnvironmentLayout {
    /// Layout rooted at `<parent>/app_environment`. Nothing is created yet.
    pub fn new(parent: impl AsRef<Path>) -> Self {
        let root = parent.as_ref().join(APP_ENVIRONMENT_FOLDER);
        let app_folder = root.join(APP_DEFAULT_FOLDER);
        Self { root, app_folder }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn venv_folder(&self) -> PathBuf {
        self.root.join(VENV_FOLDER_NAME)
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    #[must_use]
    pub fn context_file(&self) -> PathBuf {
        self.root.join(CONTEXT_FILE_NAME)
    }

    #[must_use]
    pub fn app_folder(&self) -> &Path {
        &self.app_folder
    }

    pub fn set_app_folder(&mut self, folder: impl Into<PathBuf>) {
        self.app_folder = folder.into();
    }

    /// Create every folder and file of the layout that is missing.
    ///
    /// # Errors
    /// Returns an error when any part of the layout cannot be created.
    pub fn prepare(&self) -> Result<()> {
        fs_err::create_dir_all(&self.root)
            .context("failed to create the app environment folder")?;
        self.prepare_config_file()?;
        self.prepare_context_file()?;
        self.prepare_venv_folder()?;
        let default_app = self.root.join(APP_DEFAULT_FOLDER);
        fs_err::create_dir_all(&default_app)?;
        info!(root = %self.root.display(), "app environment prepared");
        Ok(())
    }

    /// # Errors
    /// Returns an error when the folder cannot be created.
    pub fn prepare_venv_folder(&self) -> Result<()> {
        fs_err::create_dir_all(self.venv_folder())?;
        Ok(())
    }

    /// # Errors
    /// Returns an error when the config file cannot be written.
    pub fn prepare_config_file(&self) -> Result<()> {
        let path = self.config_file();
        if !path.exists() {
            let content = serde_json::to_string_pretty(&default_config_content())?;
            fs_err::write(&path, content)?;
            info!(path = %path.display(), "config file created");
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error when the context file cannot be written.
    pub fn prepare_context_file(&self) -> Result<()> {
        let path = self.context_file();
        if !path.exists() {
            fs_err::write(&path, "{}")?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error when the venv cannot be removed.
    pub fn remove_venv_folder(&self) -> Result<()> {
        let venv = self.venv_folder();
        if venv.exists() {
            info!(path = %venv.display(), "removing venv folder");
        }
        remove_path(&venv)
    }

    /// # Errors
    /// Returns an error when the file cannot be removed.
    pub fn remove_context_file(&self) -> Result<()> {
        remove_path(&self.context_file())
    }

    /// # Errors
    /// Returns an error when the file cannot be removed.
    pub fn remove_config_file(&self) -> Result<()> {
        remove_path(&self.config_file())
    }

    /// Remove venv, config and context, leaving the app folder alone.
    ///
    /// # Errors
    /// Returns an error when any of the items cannot be removed.
    pub fn clear_except_app_folder(&self) -> Result<()> {
        self.remove_context_file()?;
        self.remove_config_file()?;
        self.remove_venv_folder()
    }
}

/// Whether `folder` is missing or holds nothing but names in `ignore`.
pub fn folder_is_empty(folder: &Path, ignore: &[&str]) -> bool {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return true;
    };
    !entries.flatten().any(|entry| {
        let name = entry.file_name();
        !ignore.iter().any(|skip| name.to_string_lossy() == *skip)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn prepare_creates_every_piece() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = EnvironmentLayout::new(temp.path());
        layout.prepare().expect("prepare");
        assert!(layout.venv_folder().is_dir());
        assert!(layout.app_folder().is_dir());
        assert!(layout.context_file().is_file());
        let config: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(layout.config_file()).expect("read"))
                .expect("json");
        assert_eq!(config["app_files"], serde_json::json!({}));
        assert_eq!(config["main_file"], "");
    }

    #[test]
    fn prepare_keeps_existing_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = EnvironmentLayout::new(temp.path());
        layout.prepare().expect("prepare");
        fs::write(layout.config_file(), r#"{"main_file": "run.py"}"#).expect("write");
        layout.prepare().expect("prepare again");
        assert!(fs::read_to_string(layout.config_file())
            .expect("read")
            .contains("run.py"));
    }

    #[test]
    fn clear_except_app_folder_keeps_app() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = EnvironmentLayout::new(temp.path());
        layout.prepare().expect("prepare");
        fs::write(layout.app_folder().join("main.py"), "print(1)").expect("app file");

        layout.clear_except_app_folder().expect("clear");
        assert!(!layout.venv_folder().exists());
        assert!(!layout.config_file().exists());
        assert!(!layout.context_file().exists());
        assert!(layout.app_folder().join("main.py").exists());
    }

    #[test]
    fn folder_is_empty_respects_ignore_list() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(folder_is_empty(temp.path(), &[]));
        assert!(folder_is_empty(&temp.path().join("missing"), &[]));
        fs::write(temp.path().join(".keep"), "").expect("keep");
        assert!(folder_is_empty(temp.path(), &[".keep"]));
        assert!(!folder_is_empty(temp.path(), &[]));
    }
}
