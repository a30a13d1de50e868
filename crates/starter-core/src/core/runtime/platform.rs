//! The per-OS seam between strategies and the process executor.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, bail, Result};

use super::process::{LaunchedApp, ProcessExecutor};
use crate::config::context::{CONTEXT_BIN_PATH, CONTEXT_ENV_DIR, CONTEXT_ENV_EXE};
use crate::config::ContextStore;
use crate::tooling::report::Reporter;

/// What strategies need from the host to install and run an app.
pub trait PlatformHandler: Send + Sync {
    /// Install each requirement into the venv.
    fn install_dependencies(&self, dependencies: &[String]) -> Result<()>;
    /// Run the venv interpreter with `args` inside `cwd`.
    fn install_app(&self, cwd: &Path, args: &[String]) -> Result<()>;
    /// Launch `entry` with the venv interpreter from `cwd`.
    fn start_app(&self, cwd: &Path, entry: &Path, params: Option<&str>) -> Result<()>;
}

/// Runs installs and starts through the venv recorded in the context store.
pub struct SystemPlatform {
    contexts: Arc<ContextStore>,
    executor: ProcessExecutor,
    reporter: Arc<dyn Reporter>,
    launched: Mutex<Vec<LaunchedApp>>,
}

impl SystemPlatform {
    pub fn new(
        contexts: Arc<ContextStore>,
        executor: ProcessExecutor,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            contexts,
            executor,
            reporter,
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Venv interpreter from the context store.
    ///
    /// # Errors
    /// Returns an error when no venv context has been stored yet.
    pub fn python(&self) -> Result<String> {
        self.contexts
            .value(CONTEXT_ENV_EXE)
            .ok_or_else(|| anyhow!("no venv interpreter recorded in {}", self.contexts.path().display()))
    }

    /// Apps started so far that were still running when their start window
    /// closed.
    pub fn take_launched(&self) -> Vec<LaunchedApp> {
        std::mem::take(
            &mut *self
                .launched
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    fn install_cwd(&self) -> PathBuf {
        self.contexts
            .path_value(CONTEXT_BIN_PATH)
            .filter(|path| path.is_dir())
            .or_else(|| self.contexts.path_value(CONTEXT_ENV_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl PlatformHandler for SystemPlatform {
    fn install_dependencies(&self, dependencies: &[String]) -> Result<()> {
        if dependencies.is_empty() {
            self.reporter.info("no dependencies to install");
            return Ok(());
        }
        let python = self.python()?;
        let cwd = self.install_cwd();
        for dependency in dependencies {
            let argv = vec![
                python.clone(),
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                dependency.clone(),
            ];
            self.executor.install(dependency, &argv, &cwd)?;
        }
        Ok(())
    }

    fn install_app(&self, cwd: &Path, args: &[String]) -> Result<()> {
        let mut argv = vec![self.python()?];
        argv.extend(args.iter().cloned());
        self.executor.install("app", &argv, cwd)?;
        Ok(())
    }

    fn start_app(&self, cwd: &Path, entry: &Path, params: Option<&str>) -> Result<()> {
        if !entry.is_file() {
            bail!("entry point {} does not exist", entry.display());
        }
        if !cwd.is_dir() {
            bail!("working directory {} does not exist", cwd.display());
        }
        let mut argv = vec![self.python()?, entry.display().to_string()];
        if let Some(params) = params {
            argv.extend(split_params(params));
        }
        let label = entry
            .file_name()
            .map_or_else(|| entry.display().to_string(), |name| name.to_string_lossy().into_owned());
        if let Some(app) = self.executor.start(&label, &argv, cwd)? {
            self.launched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(app);
        }
        Ok(())
    }
}

/// Split a parameter string into arguments. Single quotes are literal,
/// double quotes allow `\"` and `\\`, a backslash outside quotes escapes the
/// next character. An unterminated quote runs to the end of the input.
pub fn split_params(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_arg = true;
                for quoted in chars.by_ref() {
                    if quoted == '\'' {
                        break;
                    }
                    current.push(quoted);
                }
            }
            '"' => {
                in_arg = true;
                while let Some(quoted) = chars.next() {
                    match quoted {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some(next @ ('"' | '\\')) => current.push(next),
                            Some(next) => {
                                current.push('\\');
                                current.push(next);
                            }
                            None => current.push('\\'),
                        },
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_arg = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ch if ch.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            other => {
                in_arg = true;
                current.push(other);
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_params_honours_quotes() {
        assert_eq!(split_params("--port 8080"), vec!["--port", "8080"]);
        assert_eq!(
            split_params(r#"--name "my app" --path 'C:\data dir'"#),
            vec!["--name", "my app", "--path", r"C:\data dir"]
        );
        assert_eq!(split_params(r#"say\ hi "" x"#), vec!["say hi", "", "x"]);
        assert_eq!(split_params(r#""a \"b\"""#), vec![r#"a "b""#]);
        assert!(split_params("   ").is_empty());
        assert_eq!(split_params("'open ended"), vec!["open ended"]);
    }

    #[cfg(unix)]
    mod system {
        use super::super::*;
        use crate::config::VenvContext;
        use crate::tooling::report::MemoryReporter;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        /// A fake interpreter that appends its arguments to `calls.log`.
        fn fake_venv(root: &Path) -> (Arc<ContextStore>, PathBuf) {
            let bin = root.join("venv").join("bin");
            fs::create_dir_all(&bin).expect("bin");
            let log = root.join("calls.log");
            let python = bin.join("python");
            fs::write(
                &python,
                format!("#!/bin/sh\necho \"$@\" >> '{}'\n", log.display()),
            )
            .expect("script");
            fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).expect("chmod");
            let contexts = Arc::new(ContextStore::open(root.join("context.json")));
            contexts
                .store(&VenvContext {
                    env_dir: root.join("venv").display().to_string(),
                    env_name: "venv".into(),
                    env_exe: python.display().to_string(),
                    bin_path: bin.display().to_string(),
                    python_dir: "/usr/bin".into(),
                    executable: "/usr/bin/python3".into(),
                })
                .expect("store");
            (contexts, log)
        }

        fn platform(contexts: Arc<ContextStore>) -> SystemPlatform {
            let reporter = MemoryReporter::shared();
            SystemPlatform::new(
                contexts,
                ProcessExecutor::new(reporter.clone(), Duration::from_millis(2000)),
                reporter,
            )
        }

        #[test]
        fn installs_dependencies_one_at_a_time() {
            let temp = tempfile::tempdir().expect("tempdir");
            let (contexts, log) = fake_venv(temp.path());
            platform(contexts)
                .install_dependencies(&["requests==2.0".into(), "rich".into()])
                .expect("install");
            assert_eq!(
                fs::read_to_string(log).expect("log"),
                "-m pip install requests==2.0\n-m pip install rich\n"
            );
        }

        #[test]
        fn starts_entry_with_split_params() {
            let temp = tempfile::tempdir().expect("tempdir");
            let (contexts, log) = fake_venv(temp.path());
            let app = temp.path().join("app");
            fs::create_dir_all(&app).expect("app");
            let entry = app.join("main.py");
            fs::write(&entry, "print('hi')").expect("entry");

            let platform = platform(contexts);
            platform
                .start_app(&app, &entry, Some("--mode 'fast run'"))
                .expect("start");
            let recorded = fs::read_to_string(log).expect("log");
            assert_eq!(recorded, format!("{} --mode fast run\n", entry.display()));
            for launched in platform.take_launched() {
                launched.wait().expect("wait");
            }
        }

        #[test]
        fn start_of_missing_entry_fails() {
            let temp = tempfile::tempdir().expect("tempdir");
            let (contexts, _log) = fake_venv(temp.path());
            let err = platform(contexts)
                .start_app(temp.path(), &temp.path().join("gone.py"), None)
                .expect_err("missing entry");
            assert!(err.to_string().contains("gone.py"));
        }

        #[test]
        fn install_without_context_is_an_error() {
            let temp = tempfile::tempdir().expect("tempdir");
            let contexts = Arc::new(ContextStore::open(temp.path().join("context.json")));
            let err = platform(contexts)
                .install_app(temp.path(), &["-m".into(), "pip".into()])
                .expect_err("no interpreter");
            assert!(err.to_string().contains("no venv interpreter"));
        }
    }
}
