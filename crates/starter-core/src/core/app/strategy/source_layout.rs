use anyhow::Result;
use starter_domain::{common_package_root, read_package_sources, SetupScript};

use super::{entry_points_under, Collaborators, EntryPoints, Strategy, StrategyKind, EDITABLE_INSTALL_ARGS};
use crate::app::dependencies::{requirement_dependencies, SetupFile, REQUIREMENT_FILTER};
use crate::runtime::PlatformHandler;
use crate::tooling::errors::StarterError;

const FILTERS: &[&str] = &["**/*.py", "**/*.toml", REQUIREMENT_FILTER];
const MANIFEST_FILTER: &str = "**/*.toml";
const PYPROJECT_FILE_NAME: &str = "pyproject.toml";

/// `pyproject.toml`/poetry source trees, installed through a synthesized
/// `setup.py` rooted at the declared packages.
pub struct SourceLayoutStrategy {
    collaborators: Collaborators,
}

impl SourceLayoutStrategy {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Common folder of the packages the root `pyproject.toml` declares,
    /// relative to the app folder. Empty when nothing narrower applies.
    ///
    /// # Errors
    /// Returns an error when the manifest exists but cannot be parsed.
    pub fn package_root(&self) -> Result<String> {
        let pyproject = self.collaborators.app_folder.join(PYPROJECT_FILE_NAME);
        if !pyproject.is_file() {
            return Ok(String::new());
        }
        let sources = read_package_sources(&pyproject)?;
        Ok(common_package_root(&sources).unwrap_or_default())
    }
}

impl Strategy for SourceLayoutStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SourceLayout
    }

    fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Any TOML manifest anywhere under the app folder.
    fn it_is_me(&self) -> bool {
        let c = &self.collaborators;
        if !c.app_folder.is_dir() {
            return false;
        }
        super::matching_files(&c.app_folder, &[MANIFEST_FILTER], c.reporter.as_ref())
            .is_ok_and(|files| !files.is_empty())
    }

    fn filters(&self) -> &'static [&'static str] {
        FILTERS
    }

    fn install(&self, platform: &dyn PlatformHandler) -> Result<()> {
        let c = &self.collaborators;
        let root = self.package_root()?;
        c.reporter.info(&format!(
            "package root is {}",
            if root.is_empty() { "." } else { root.as_str() }
        ));
        let setup = SetupFile::ensure(&c.app_folder, &SetupScript::with_package_root(root))?;
        if !setup.exists() {
            return Err(StarterError::MissingSetupScript {
                path: setup.path().to_path_buf(),
            }
            .into());
        }
        let dependencies = requirement_dependencies(&c.app_folder, c.reporter.as_ref())?;
        if !dependencies.is_empty() {
            platform.install_dependencies(&dependencies)?;
        }
        let args: Vec<String> = EDITABLE_INSTALL_ARGS.iter().map(ToString::to_string).collect();
        platform.install_app(&c.app_folder, &args)
    }

    fn search_for_main_files(&self) -> Result<EntryPoints> {
        entry_points_under(&self.collaborators, &self.collaborators.app_folder)
    }
}
