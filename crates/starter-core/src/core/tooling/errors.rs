use std::path::PathBuf;

/// Failures the launcher distinguishes when reporting a run.
#[derive(thiserror::Error, Debug)]
pub enum StarterError {
    #[error("installing {label} failed (exit code {code:?}): {stderr}")]
    InstallFailed {
        label: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("no runnable entry point found under {}", folder.display())]
    NoEntryPoint { folder: PathBuf },
    #[error("none of the {attempted} entry point(s) under {} could be started", folder.display())]
    EntryPointsFailed { folder: PathBuf, attempted: usize },
    #[error("{} does not exist and could not be synthesized", path.display())]
    MissingSetupScript { path: PathBuf },
    #[error("no python interpreter available: {0}")]
    MissingInterpreter(String),
    #[error("failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{label} exited early (exit code {code:?}): {stderr}")]
    StartFailed {
        label: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl StarterError {
    /// Stable identifier used in JSON details.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            StarterError::InstallFailed { .. } => "install_failed",
            StarterError::NoEntryPoint { .. } => "no_entry_point",
            StarterError::EntryPointsFailed { .. } => "entry_points_failed",
            StarterError::MissingSetupScript { .. } => "missing_setup_script",
            StarterError::MissingInterpreter(_) => "missing_interpreter",
            StarterError::Spawn { .. } => "spawn_failed",
            StarterError::StartFailed { .. } => "start_failed",
        }
    }

    /// Whether the failure means "this app cannot be run" rather than a
    /// broken environment.
    #[must_use]
    pub fn is_entry_point_failure(&self) -> bool {
        matches!(
            self,
            StarterError::NoEntryPoint { .. } | StarterError::EntryPointsFailed { .. }
        )
    }
}

pub(crate) fn starter_error(err: &anyhow::Error) -> Option<&StarterError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StarterError>())
}
