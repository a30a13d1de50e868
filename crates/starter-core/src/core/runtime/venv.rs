//! Build or reuse the app venv and keep `context.json` in step with it.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use super::platform::PlatformHandler;
use super::process::ProcessExecutor;
use crate::config::{ContextStore, LauncherSettings, VenvContext};
use crate::layout::{folder_is_empty, EnvironmentLayout};

const PYVENV_CFG: &str = "pyvenv.cfg";
const BOOTSTRAP_PACKAGES: [&str; 2] = ["pip", "setuptools"];

/// Interpreter layout of a venv at `venv` built from `base_python`.
pub fn venv_context_for(venv: &Path, base_python: &Path) -> VenvContext {
    let bin = if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    };
    let exe = if cfg!(windows) {
        bin.join("python.exe")
    } else {
        bin.join("python")
    };
    VenvContext {
        env_dir: display(venv),
        env_name: venv
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        env_exe: display(&exe),
        bin_path: display(&bin),
        python_dir: base_python.parent().map(display).unwrap_or_default(),
        executable: display(base_python),
    }
}

/// Make sure the venv exists and its context is stored.
///
/// An empty venv folder gets a fresh `python -m venv` plus the packaging
/// bootstrap; a populated one is reused.
///
/// # Errors
/// Returns an error when the venv cannot be created, the context cannot be
/// stored or the bootstrap install fails.
pub fn prepare_venv(
    layout: &EnvironmentLayout,
    contexts: &ContextStore,
    settings: &LauncherSettings,
    executor: &ProcessExecutor,
    platform: &dyn PlatformHandler,
) -> Result<VenvContext> {
    let venv = layout.venv_folder();
    if !folder_is_empty(&venv, &[]) {
        return use_existing_venv(&venv, contexts);
    }

    let base = settings.base_python()?;
    info!(python = %base, venv = %venv.display(), "creating venv");
    let argv = vec![
        base.clone(),
        "-m".to_string(),
        "venv".to_string(),
        display(&venv),
    ];
    executor.install("venv", &argv, layout.root())?;

    let context = venv_context_for(&venv, Path::new(&base));
    contexts.store(&context)?;
    let bootstrap: Vec<String> = BOOTSTRAP_PACKAGES.iter().map(ToString::to_string).collect();
    platform.install_dependencies(&bootstrap)?;
    Ok(context)
}

fn use_existing_venv(venv: &Path, contexts: &ContextStore) -> Result<VenvContext> {
    contexts.load();
    if let Some(context) = contexts.venv_context() {
        info!(venv = %venv.display(), "using existing venv");
        return Ok(context);
    }
    warn!(venv = %venv.display(), "venv context missing; rebuilding it from the venv");
    let base = base_python_from_cfg(venv)
        .ok_or_else(|| anyhow!("cannot tell which interpreter built {}", venv.display()))?;
    let context = venv_context_for(venv, &base);
    contexts.store(&context)?;
    Ok(context)
}

/// Base interpreter recorded in `pyvenv.cfg` (`executable`, else
/// `home/python3`).
fn base_python_from_cfg(venv: &Path) -> Option<PathBuf> {
    let contents = std::fs::read_to_string(venv.join(PYVENV_CFG)).ok()?;
    let mut home = None;
    for line in contents.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "executable" => return Some(PathBuf::from(value.trim())),
            "home" => home = Some(PathBuf::from(value.trim())),
            _ => {}
        }
    }
    let python = if cfg!(windows) { "python.exe" } else { "python3" };
    home.map(|home| home.join(python))
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
