use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

const DEFAULT_START_WINDOW_MS: u64 = 3_000;

#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Knobs read from the process environment once per run.
#[derive(Debug, Clone)]
pub struct LauncherSettings {
    pub(crate) base_python: Option<String>,
    pub(crate) environment_root: PathBuf,
    pub(crate) start_window: Duration,
}

impl LauncherSettings {
    /// Settings rooted at `environment_root`, everything else defaulted.
    pub fn new(environment_root: impl Into<PathBuf>) -> Self {
        Self {
            base_python: None,
            environment_root: environment_root.into(),
            start_window: Duration::from_millis(DEFAULT_START_WINDOW_MS),
        }
    }

    /// Builds the settings from the current process environment.
    ///
    /// # Errors
    /// Returns an error if no environment root can be derived.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let environment_root = match snapshot.var("STARTER_ENV_ROOT") {
            Some(root) => PathBuf::from(root),
            None => default_environment_root()?,
        };
        let start_window = match snapshot.var("STARTER_START_WINDOW_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("STARTER_START_WINDOW_MS is not a number: {raw}"))?,
            ),
            None => Duration::from_millis(DEFAULT_START_WINDOW_MS),
        };
        Ok(Self {
            base_python: snapshot.var("STARTER_PYTHON").map(ToOwned::to_owned),
            environment_root,
            start_window,
        })
    }

    #[must_use]
    pub fn with_environment_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.environment_root = root.into();
        self
    }

    #[must_use]
    pub fn with_base_python(mut self, python: impl Into<String>) -> Self {
        self.base_python = Some(python.into());
        self
    }

    #[must_use]
    pub fn with_start_window(mut self, window: Duration) -> Self {
        self.start_window = window;
        self
    }

    #[must_use]
    pub fn environment_root(&self) -> &PathBuf {
        &self.environment_root
    }

    #[must_use]
    pub fn start_window(&self) -> Duration {
        self.start_window
    }

    /// Interpreter used to build the venv: `STARTER_PYTHON`, else the first
    /// `python3`/`python` found on `PATH`.
    ///
    /// # Errors
    /// Returns an error when no interpreter can be located.
    pub fn base_python(&self) -> Result<String> {
        if let Some(explicit) = &self.base_python {
            return Ok(explicit.clone());
        }
        for candidate in ["python3", "python"] {
            if let Ok(path) = which::which(candidate) {
                return path
                    .into_os_string()
                    .into_string()
                    .map_err(|_| anyhow!("non-utf8 interpreter path"));
            }
        }
        Err(anyhow!(crate::StarterError::MissingInterpreter(
            "set STARTER_PYTHON or put python3 on PATH".to_string()
        )))
    }
}

fn default_environment_root() -> Result<PathBuf> {
    let exe = env::current_exe().context("cannot locate the launcher executable")?;
    exe.parent()
        .map(std::path::Path::to_path_buf)
        .ok_or_else(|| anyhow!("launcher executable has no parent directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_overrides_from_snapshot() {
        let snapshot = EnvSnapshot::testing(&[
            ("STARTER_ENV_ROOT", "/tmp/starter"),
            ("STARTER_START_WINDOW_MS", "250"),
            ("STARTER_PYTHON", "/opt/python/bin/python3"),
        ]);
        let settings = LauncherSettings::from_snapshot(&snapshot).expect("settings");
        assert_eq!(settings.environment_root(), &PathBuf::from("/tmp/starter"));
        assert_eq!(settings.start_window(), Duration::from_millis(250));
        assert_eq!(
            settings.base_python().expect("python"),
            "/opt/python/bin/python3"
        );
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let snapshot = EnvSnapshot::testing(&[("STARTER_START_WINDOW_MS", "  ")]);
        let settings = LauncherSettings::from_snapshot(&snapshot).expect("settings");
        assert_eq!(
            settings.start_window(),
            Duration::from_millis(DEFAULT_START_WINDOW_MS)
        );
        assert!(settings.environment_root().is_absolute());
    }

    #[test]
    fn rejects_non_numeric_start_window() {
        let snapshot = EnvSnapshot::testing(&[("STARTER_START_WINDOW_MS", "soon")]);
        assert!(LauncherSettings::from_snapshot(&snapshot).is_err());
    }
}
