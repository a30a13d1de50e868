use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use starter_domain::installed_name_candidates;
use walkdir::WalkDir;

use super::{entry_points_under, Collaborators, EntryPoints, Strategy, StrategyKind};
use crate::app::dependencies::{requirement_dependencies, REQUIREMENT_FILTER};
use crate::config::context::CONTEXT_PYTHON_DIR;
use crate::fs::copy_into;
use crate::runtime::PlatformHandler;

const FILTERS: &[&str] = &["**/*.whl", REQUIREMENT_FILTER];
const SITE_PACKAGES: &str = "site-packages";
/// `lib/pythonX.Y/site-packages` is the deepest layout we look for.
const SITE_PACKAGES_DEPTH: usize = 3;

/// A wheel dropped directly into the app folder.
pub struct WheelStrategy {
    collaborators: Collaborators,
}

impl WheelStrategy {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// First wheel (by name) at the app root.
    pub fn wheel_file(&self) -> Option<PathBuf> {
        self.collaborators.root_wheels().into_iter().next()
    }

    /// Folder the wheel's top-level package was installed into: searched in
    /// the venv first, then next to the base interpreter.
    pub fn installed_location(&self) -> Option<PathBuf> {
        let wheel = self.wheel_file()?;
        let name = wheel.file_name()?.to_string_lossy().into_owned();
        let c = &self.collaborators;
        if let Some(found) = resolve_installed_location(&c.venv_folder, &name) {
            return Some(found);
        }
        let base_root = c
            .contexts
            .as_ref()
            .and_then(|contexts| contexts.path_value(CONTEXT_PYTHON_DIR))
            .and_then(|dir| dir.parent().map(Path::to_path_buf))?;
        resolve_installed_location(&base_root, &name)
    }

    /// Copy everything beside the wheel into the installed package folder.
    fn copy_extra_files(&self, wheel: &Path, destination: &Path) {
        let c = &self.collaborators;
        let entries = match std::fs::read_dir(&c.app_folder) {
            Ok(entries) => entries,
            Err(err) => {
                c.reporter
                    .error(&format!("cannot list extra files: {err}"));
                return;
            }
        };
        for entry in entries.flatten() {
            let source = entry.path();
            if source == wheel {
                continue;
            }
            let target = destination.join(entry.file_name());
            if let Err(err) = copy_into(&source, &target) {
                c.reporter.error(&format!(
                    "copying {} to {} failed: {err:#}",
                    source.display(),
                    target.display()
                ));
            }
        }
    }
}

impl Strategy for WheelStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Wheel
    }

    fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    fn it_is_me(&self) -> bool {
        self.wheel_file().is_some()
    }

    fn filters(&self) -> &'static [&'static str] {
        FILTERS
    }

    fn install(&self, platform: &dyn PlatformHandler) -> Result<()> {
        let c = &self.collaborators;
        let wheel = self
            .wheel_file()
            .ok_or_else(|| anyhow!("no wheel found in {}", c.app_folder.display()))?;
        let dependencies = requirement_dependencies(&c.app_folder, c.reporter.as_ref())?;
        if !dependencies.is_empty() {
            platform.install_dependencies(&dependencies)?;
        }
        let args = vec![
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            wheel.display().to_string(),
        ];
        platform.install_app(&c.app_folder, &args)?;

        match self.installed_location() {
            Some(location) => self.copy_extra_files(&wheel, &location),
            None => c.reporter.warn(&format!(
                "cannot tell where {} was installed; extra files not copied",
                wheel.display()
            )),
        }
        Ok(())
    }

    fn search_for_main_files(&self) -> Result<EntryPoints> {
        match self.installed_location() {
            Some(location) => entry_points_under(&self.collaborators, &location),
            None => Ok(EntryPoints {
                files: BTreeSet::new(),
                cwd: self.collaborators.app_folder.clone(),
            }),
        }
    }
}

/// Match the dash-separated prefixes of `wheel_name` against package
/// folders in every `site-packages` under `root`, shortest prefix first,
/// ignoring case.
pub fn resolve_installed_location(root: &Path, wheel_name: &str) -> Option<PathBuf> {
    let packages: Vec<PathBuf> = site_packages_dirs(root)
        .iter()
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flat_map(|entries| entries.flatten().map(|entry| entry.path()))
        .filter(|path| path.is_dir())
        .collect();
    let found = installed_name_candidates(wheel_name)
        .iter()
        .find_map(|candidate| {
            packages.iter().find(|package| {
                package
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(candidate))
            })
        })
        .cloned();
    found
}

fn site_packages_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(SITE_PACKAGES_DEPTH)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir() && entry.file_name() == SITE_PACKAGES)
        .map(walkdir::DirEntry::into_path)
        .collect();
    dirs.sort();
    dirs
}
