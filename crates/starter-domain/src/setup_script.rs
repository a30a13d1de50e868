use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const SETUP_FILE_NAME: &str = "setup.py";

/// Metadata for a synthesized `setup.py`.
#[derive(Debug, Clone)]
pub struct SetupScript {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Package root relative to the folder holding `setup.py`; empty means
    /// the folder itself.
    pub package_root: String,
}

impl Default for SetupScript {
    fn default() -> Self {
        Self {
            name: "Application".to_string(),
            version: "0.0.1".to_string(),
            description: "Application".to_string(),
            package_root: String::new(),
        }
    }
}

impl SetupScript {
    pub fn with_package_root(package_root: impl Into<String>) -> Self {
        Self {
            package_root: package_root.into(),
            ..Self::default()
        }
    }

    /// Write the script into `folder`, returning its path.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write_into(&self, folder: &Path) -> Result<PathBuf> {
        let path = folder.join(SETUP_FILE_NAME);
        fs::write(&path, render_setup_script(self))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

pub fn render_setup_script(script: &SetupScript) -> String {
    let root = if script.package_root.is_empty() {
        ".".to_string()
    } else {
        script.package_root.replace('\\', "/")
    };
    let root = python_literal(&root);
    let package_dir = if script.package_root.is_empty() {
        String::new()
    } else {
        format!("    package_dir={{\"\": {root}}},\n")
    };
    format!(
        "from setuptools import setup, find_packages\n\n\
         setup(\n    \
         name={name},\n    \
         version={version},\n    \
         description={description},\n    \
         packages=find_packages({root}),\n\
         {package_dir})\n",
        name = python_literal(&script.name),
        version = python_literal(&script.version),
        description = python_literal(&script.description),
    )
}

fn python_literal(raw: &str) -> String {
    let escaped = raw.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
