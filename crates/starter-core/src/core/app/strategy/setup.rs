use anyhow::Result;
use starter_domain::{SetupScript, SETUP_FILE_NAME};

use super::{entry_points_under, Collaborators, EntryPoints, Strategy, StrategyKind, EDITABLE_INSTALL_ARGS};
use crate::app::dependencies::{requirement_dependencies, SetupFile, REQUIREMENT_FILTER};
use crate::runtime::PlatformHandler;
use crate::tooling::errors::StarterError;

const FILTERS: &[&str] = &["**/*.py", REQUIREMENT_FILTER];
const REQUIREMENTS_FILTER: &str = "*requirements*";

/// Legacy `setup.py` apps, installed in editable mode.
pub struct SetupToolsStrategy {
    collaborators: Collaborators,
}

impl SetupToolsStrategy {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }
}

impl Strategy for SetupToolsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SetupTools
    }

    fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// A root `setup.py`, or a root requirements file when no wheel sits
    /// beside it.
    fn it_is_me(&self) -> bool {
        let c = &self.collaborators;
        if c.app_folder.join(SETUP_FILE_NAME).is_file() {
            return true;
        }
        c.root_has(REQUIREMENTS_FILTER) && c.root_wheels().is_empty()
    }

    fn filters(&self) -> &'static [&'static str] {
        FILTERS
    }

    fn install(&self, platform: &dyn PlatformHandler) -> Result<()> {
        let c = &self.collaborators;
        let dependencies = requirement_dependencies(&c.app_folder, c.reporter.as_ref())?;
        if !dependencies.is_empty() {
            platform.install_dependencies(&dependencies)?;
        }
        let setup = SetupFile::ensure(&c.app_folder, &SetupScript::default())?;
        if setup.synthesized() {
            c.reporter
                .info(&format!("synthesized {}", setup.path().display()));
        }
        if !setup.exists() {
            return Err(StarterError::MissingSetupScript {
                path: setup.path().to_path_buf(),
            }
            .into());
        }
        let args: Vec<String> = EDITABLE_INSTALL_ARGS.iter().map(ToString::to_string).collect();
        platform.install_app(&c.app_folder, &args)
    }

    fn search_for_main_files(&self) -> Result<EntryPoints> {
        entry_points_under(&self.collaborators, &self.collaborators.app_folder)
    }
}
