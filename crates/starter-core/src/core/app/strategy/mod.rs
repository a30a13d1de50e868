//! Packaging-convention strategies.
//!
//! Each strategy decides whether it owns the app folder, whether the folder
//! drifted since the last install, how to install it and where its entry
//! points live. The install-and-start sequence itself is shared through the
//! provided [`Strategy::install_and_start`].

mod setup;
mod source_layout;
mod wheel;

pub use setup::SetupToolsStrategy;
pub use source_layout::SourceLayoutStrategy;
pub use wheel::WheelStrategy;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use starter_domain::is_wheel_file;

use super::change::{matching_files, root_files, root_matching_files, ChangeDetector};
use super::entrypoint::EntryPointLocator;
use crate::config::{ConfigStore, ContextStore};
use crate::runtime::PlatformHandler;
use crate::tooling::errors::StarterError;
use crate::tooling::report::Reporter;

/// Arguments handed to the venv interpreter for an editable install.
pub const EDITABLE_INSTALL_ARGS: [&str; 5] = ["-m", "pip", "install", "-e", "."];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    SourceLayout,
    SetupTools,
    Wheel,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::SourceLayout => "source-layout",
            StrategyKind::SetupTools => "setuptools",
            StrategyKind::Wheel => "wheel",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handles every strategy needs. Cloned into each strategy.
#[derive(Clone)]
pub struct Collaborators {
    pub app_folder: PathBuf,
    pub venv_folder: PathBuf,
    pub config: Arc<dyn ConfigStore>,
    pub contexts: Option<Arc<ContextStore>>,
    pub platform: Option<Arc<dyn PlatformHandler>>,
    pub reporter: Arc<dyn Reporter>,
    pub detector: ChangeDetector,
    pub locator: EntryPointLocator,
}

impl Collaborators {
    /// # Errors
    /// Returns an error if the entry-point locator cannot be built.
    pub fn new(
        app_folder: impl Into<PathBuf>,
        venv_folder: impl Into<PathBuf>,
        config: Arc<dyn ConfigStore>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        Ok(Self {
            app_folder: app_folder.into(),
            venv_folder: venv_folder.into(),
            config,
            contexts: None,
            platform: None,
            detector: ChangeDetector::new(Arc::clone(&reporter)),
            locator: EntryPointLocator::new(Arc::clone(&reporter))?,
            reporter,
        })
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Arc<dyn PlatformHandler>) -> Self {
        self.platform = Some(platform);
        self
    }

    #[must_use]
    pub fn with_contexts(mut self, contexts: Arc<ContextStore>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    /// Whether any file directly in the app folder matches `filter`.
    pub(crate) fn root_has(&self, filter: &str) -> bool {
        root_matching_files(&self.app_folder, filter, self.reporter.as_ref())
            .is_ok_and(|files| !files.is_empty())
    }

    /// Wheels directly in the app folder, sorted. The extension is matched
    /// case-insensitively.
    pub(crate) fn root_wheels(&self) -> Vec<PathBuf> {
        root_files(&self.app_folder, self.reporter.as_ref())
            .into_iter()
            .filter(|path| is_wheel_file(path))
            .collect()
    }
}

/// Candidate entry points and the folder to start them from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoints {
    pub files: BTreeSet<PathBuf>,
    pub cwd: PathBuf,
}

pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn collaborators(&self) -> &Collaborators;

    /// Whether this strategy owns the app folder.
    fn it_is_me(&self) -> bool;

    /// Globs (relative to the app folder) whose files make up the manifest.
    fn filters(&self) -> &'static [&'static str];

    /// Install dependencies and the app itself.
    fn install(&self, platform: &dyn PlatformHandler) -> Result<()>;

    fn search_for_main_files(&self) -> Result<EntryPoints>;

    /// Whether the app folder drifted from the stored manifest.
    fn files_changed(&self) -> Result<bool> {
        let c = self.collaborators();
        let previous = c.config.app_files();
        c.detector
            .changed(previous.as_ref(), &c.app_folder, self.filters())
    }

    /// Install (when `start_fresh`) and start the app if this strategy owns
    /// the folder. Returns whether the next strategy should be tried.
    ///
    /// # Errors
    /// A failed install of an owned folder is returned after the stored
    /// manifest is discarded. No entry point, or none that starts, is
    /// [`StarterError::NoEntryPoint`] / [`StarterError::EntryPointsFailed`].
    fn install_and_start(&self, start_fresh: bool, continue_processing: bool) -> Result<bool> {
        if !continue_processing || !self.it_is_me() {
            return Ok(continue_processing);
        }
        let c = self.collaborators();
        c.reporter
            .info(&format!("{} owns {}", self.kind(), c.app_folder.display()));
        let Some(platform) = c.platform.as_deref() else {
            c.reporter
                .warn(&format!("no platform handler; {} cannot install or start", self.kind()));
            return Ok(continue_processing);
        };

        if start_fresh {
            let manifest = c.detector.snapshot(&c.app_folder, self.filters())?;
            if !manifest.is_empty() {
                c.config.set_app_files(&manifest)?;
            }
            if let Err(err) = self.install(platform) {
                c.reporter
                    .error(&format!("installing the app failed: {err:#}"));
                if let Err(discard) = c.config.remove_app_files() {
                    c.reporter
                        .error(&format!("cannot discard the stored manifest: {discard:#}"));
                }
                return Err(err);
            }
        }

        let entries = self.search_for_main_files()?;
        start_entry_points(c, platform, &entries)?;
        Ok(false)
    }
}

fn start_entry_points(
    c: &Collaborators,
    platform: &dyn PlatformHandler,
    entries: &EntryPoints,
) -> Result<()> {
    if entries.files.is_empty() {
        c.reporter.error("no entry point found; cannot start the app");
        return Err(StarterError::NoEntryPoint {
            folder: entries.cwd.clone(),
        }
        .into());
    }
    let params = c.config.app_params();
    let mut failures = 0;
    for entry in &entries.files {
        if let Err(err) = platform.start_app(&entries.cwd, entry, params.as_deref()) {
            c.reporter
                .error(&format!("starting {} failed: {err:#}", entry.display()));
            failures += 1;
        }
    }
    if failures == entries.files.len() {
        return Err(StarterError::EntryPointsFailed {
            folder: entries.cwd.clone(),
            attempted: failures,
        }
        .into());
    }
    Ok(())
}

/// Entry points found under `folder` honouring the configured main file.
pub(crate) fn entry_points_under(c: &Collaborators, folder: &Path) -> Result<EntryPoints> {
    let main_file = c.config.main_file();
    Ok(EntryPoints {
        files: c.locator.find(folder, main_file.as_deref())?,
        cwd: folder.to_path_buf(),
    })
}
