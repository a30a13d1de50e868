//! Child-process execution for installs and app starts.
//!
//! Both pipes of every child are drained on their own thread into a shared
//! [`OutputLog`], so a chatty child never blocks on a full pipe while the
//! parent waits on it.

use std::{
    fmt,
    io::{BufRead, BufReader, Read},
    path::Path,
    process::{Child, Command, Stdio},
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};

use crate::tooling::errors::StarterError;
use crate::tooling::report::Reporter;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// How long drains may still read after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
}

/// Ordered fan-in of both output streams of one child.
pub struct OutputLog {
    label: String,
    reporter: Arc<dyn Reporter>,
    lines: Mutex<Vec<OutputLine>>,
}

impl OutputLog {
    fn new(label: &str, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            label: label.to_string(),
            reporter,
            lines: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, stream: Stream, text: String) {
        match stream {
            Stream::Stdout => self.reporter.info(&format!("[{}] {text}", self.label)),
            Stream::Stderr => self.reporter.warn(&format!("[{}] {text}", self.label)),
        }
        let mut lines = self
            .lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        lines.push(OutputLine { stream, text });
    }

    #[must_use]
    pub fn lines(&self) -> Vec<OutputLine> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn text(&self, stream: Stream) -> String {
        self.lines()
            .into_iter()
            .filter(|line| line.stream == stream)
            .map(|line| line.text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// An app that outlived the start window. Its output keeps flowing into the
/// reporter until [`LaunchedApp::wait`] observes the exit.
pub struct LaunchedApp {
    label: String,
    child: Child,
    drains: Vec<JoinHandle<()>>,
    log: Arc<OutputLog>,
}

impl fmt::Debug for LaunchedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedApp")
            .field("label", &self.label)
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

impl LaunchedApp {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    #[must_use]
    pub fn output(&self) -> Vec<OutputLine> {
        self.log.lines()
    }

    /// Block until the app exits and both streams are closed.
    ///
    /// # Errors
    /// Returns an error when the exit status cannot be collected.
    pub fn wait(mut self) -> Result<Option<i32>> {
        let status = self
            .child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.label))?;
        join_drains(std::mem::take(&mut self.drains))?;
        Ok(status.code())
    }
}

#[derive(Clone)]
pub struct ProcessExecutor {
    reporter: Arc<dyn Reporter>,
    start_window: Duration,
}

impl ProcessExecutor {
    pub fn new(reporter: Arc<dyn Reporter>, start_window: Duration) -> Self {
        Self {
            reporter,
            start_window,
        }
    }

    /// Run an installer to completion. Returns `None` when a parameter is
    /// missing and nothing was run.
    ///
    /// # Errors
    /// Returns [`StarterError::Spawn`] when the program cannot be started and
    /// [`StarterError::InstallFailed`] on a non-zero exit.
    pub fn install(&self, label: &str, argv: &[String], cwd: &Path) -> Result<Option<RunOutput>> {
        if !self.validate("install", label, argv, cwd) {
            return Ok(None);
        }
        self.reporter
            .info(&format!("installing {label}: {}", argv.join(" ")));
        let (mut child, drains, log) = self.spawn(label, argv, cwd)?;
        let status = match child.wait() {
            Ok(status) => status,
            Err(err) => {
                self.abandon(label, &mut child, drains);
                return Err(err).with_context(|| format!("failed to wait for {label}"));
            }
        };
        join_drains(drains)?;
        let output = RunOutput {
            code: status.code().unwrap_or(-1),
            stdout: log.text(Stream::Stdout),
            stderr: log.text(Stream::Stderr),
        };
        if !status.success() {
            self.reporter
                .error(&format!("installing {label} failed with {status}"));
            return Err(StarterError::InstallFailed {
                label: label.to_string(),
                code: status.code(),
                stderr: output.stderr,
            }
            .into());
        }
        self.reporter.info(&format!("installed {label}"));
        Ok(Some(output))
    }

    /// Launch an app and watch it for the start window. An early non-zero
    /// exit is a start failure; anything still running afterwards is handed
    /// back untouched.
    ///
    /// Never blocks past the window (plus a short grace for trailing output),
    /// even when a process forked by the app keeps the pipes open.
    ///
    /// # Errors
    /// Returns [`StarterError::Spawn`] when the program cannot be started and
    /// [`StarterError::StartFailed`] when it exits non-zero inside the window.
    pub fn start(&self, label: &str, argv: &[String], cwd: &Path) -> Result<Option<LaunchedApp>> {
        if !self.validate("start", label, argv, cwd) {
            return Ok(None);
        }
        self.reporter
            .info(&format!("starting {label}: {}", argv.join(" ")));
        let (mut child, drains, log) = self.spawn(label, argv, cwd)?;
        let started = Instant::now();
        loop {
            let exited = match child.try_wait() {
                Ok(exited) => exited,
                Err(err) => {
                    self.abandon(label, &mut child, drains);
                    return Err(err).with_context(|| format!("failed to poll {label}"));
                }
            };
            if let Some(status) = exited {
                let deadline = (started + self.start_window).max(Instant::now() + DRAIN_GRACE);
                if !join_drains_until(drains, deadline)? {
                    self.reporter
                        .debug(&format!("{label} exited but its output is still open"));
                }
                if !status.success() {
                    return Err(StarterError::StartFailed {
                        label: label.to_string(),
                        code: status.code(),
                        stderr: log.text(Stream::Stderr),
                    }
                    .into());
                }
                self.reporter.info(&format!("{label} finished"));
                return Ok(Some(LaunchedApp {
                    label: label.to_string(),
                    child,
                    drains: Vec::new(),
                    log,
                }));
            }
            if started.elapsed() >= self.start_window {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.reporter
            .info(&format!("{label} is running (pid {})", child.id()));
        Ok(Some(LaunchedApp {
            label: label.to_string(),
            child,
            drains,
            log,
        }))
    }

    /// Kill and reap a child whose status could not be read, then give its
    /// drains a short grace. Drains still reading after that are detached.
    fn abandon(&self, label: &str, child: &mut Child, drains: Vec<JoinHandle<()>>) {
        if let Err(err) = child.kill() {
            self.reporter.debug(&format!("cannot kill {label}: {err}"));
        }
        if let Err(err) = child.wait() {
            self.reporter.warn(&format!("cannot reap {label}: {err}"));
        }
        match join_drains_until(drains, Instant::now() + DRAIN_GRACE) {
            Ok(true) => {}
            Ok(false) => self
                .reporter
                .debug(&format!("output of {label} is still open; detaching")),
            Err(err) => self.reporter.warn(&format!("{label}: {err:#}")),
        }
    }

    fn validate(&self, action: &str, label: &str, argv: &[String], cwd: &Path) -> bool {
        let missing = if label.is_empty() {
            Some("label")
        } else if argv.is_empty() || argv[0].is_empty() {
            Some("command")
        } else if cwd.as_os_str().is_empty() {
            Some("working directory")
        } else {
            None
        };
        if let Some(what) = missing {
            self.reporter
                .warn(&format!("cannot {action} {label:?}: missing {what}"));
            return false;
        }
        true
    }

    fn spawn(
        &self,
        label: &str,
        argv: &[String],
        cwd: &Path,
    ) -> Result<(Child, Vec<JoinHandle<()>>, Arc<OutputLog>)> {
        let program = &argv[0];
        let mut child = Command::new(program)
            .args(&argv[1..])
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| StarterError::Spawn {
                program: program.clone(),
                source,
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout missing for {program}"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr missing for {program}"))?;
        let log = Arc::new(OutputLog::new(label, Arc::clone(&self.reporter)));
        let drains = vec![
            drain(stdout, Stream::Stdout, Arc::clone(&log)),
            drain(stderr, Stream::Stderr, Arc::clone(&log)),
        ];
        Ok((child, drains, log))
    }
}

fn drain<R: Read + Send + 'static>(
    reader: R,
    stream: Stream,
    log: Arc<OutputLog>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => log.push(stream, decode_line(&buf)),
            }
        }
    })
}

fn join_drains(drains: Vec<JoinHandle<()>>) -> Result<()> {
    for handle in drains {
        handle
            .join()
            .map_err(|_| anyhow!("output reader thread panicked"))?;
    }
    Ok(())
}

/// Join every drain that finishes by `deadline`. Returns `false` when some
/// were still reading; those are detached and keep feeding their log.
fn join_drains_until(drains: Vec<JoinHandle<()>>, deadline: Instant) -> Result<bool> {
    while drains.iter().any(|handle| !handle.is_finished()) {
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(POLL_INTERVAL);
    }
    join_drains(drains)?;
    Ok(true)
}

/// UTF-8 first, Latin-1 when the bytes are not valid UTF-8.
fn decode_line(bytes: &[u8]) -> String {
    let trimmed = bytes
        .strip_suffix(b"\n")
        .map_or(bytes, |rest| rest.strip_suffix(b"\r").unwrap_or(rest));
    match std::str::from_utf8(trimmed) {
        Ok(text) => text.to_string(),
        Err(_) => trimmed.iter().copied().map(char::from).collect(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::tooling::report::MemoryReporter;
    use tracing::Level;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".into(), "-c".into(), script.into()]
    }

    fn executor(reporter: Arc<MemoryReporter>, window_ms: u64) -> ProcessExecutor {
        ProcessExecutor::new(reporter, Duration::from_millis(window_ms))
    }

    #[test]
    fn install_with_stderr_and_zero_exit_succeeds() {
        let reporter = MemoryReporter::shared();
        let temp = tempfile::tempdir().expect("tempdir");
        let output = executor(reporter.clone(), 100)
            .install("deps", &sh("echo out; echo warn 1>&2"), temp.path())
            .expect("install")
            .expect("ran");
        assert_eq!(output.code, 0);
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "warn");
        assert!(reporter.contains(Level::WARN, "[deps] warn"));
    }

    #[test]
    fn install_non_zero_exit_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = executor(MemoryReporter::shared(), 100)
            .install("deps", &sh("echo broken 1>&2; exit 3"), temp.path())
            .expect_err("must fail");
        match err.downcast_ref::<StarterError>() {
            Some(StarterError::InstallFailed { code, stderr, .. }) => {
                assert_eq!(*code, Some(3));
                assert!(stderr.contains("broken"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn large_output_on_both_streams_does_not_deadlock() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = "i=0; while [ $i -lt 4000 ]; do \
                      echo \"stdout line $i with padding padding padding\"; \
                      echo \"stderr line $i with padding padding padding\" 1>&2; \
                      i=$((i+1)); done";
        let output = executor(MemoryReporter::shared(), 100)
            .install("noisy", &sh(script), temp.path())
            .expect("install")
            .expect("ran");
        assert_eq!(output.stdout.lines().count(), 4000);
        assert_eq!(output.stderr.lines().count(), 4000);
    }

    #[test]
    fn invalid_utf8_falls_back_to_latin1() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = executor(MemoryReporter::shared(), 100)
            .install("latin", &sh("printf '\\351t\\351\\n'"), temp.path())
            .expect("install")
            .expect("ran");
        assert_eq!(output.stdout, "\u{e9}t\u{e9}");
    }

    #[test]
    fn missing_parameters_are_a_logged_no_op() {
        let reporter = MemoryReporter::shared();
        let temp = tempfile::tempdir().expect("tempdir");
        let exec = executor(reporter.clone(), 100);
        assert!(exec.install("deps", &[], temp.path()).expect("no-op").is_none());
        assert!(exec
            .start("", &sh("true"), temp.path())
            .expect("no-op")
            .is_none());
        assert!(exec
            .start("app", &sh("true"), Path::new(""))
            .expect("no-op")
            .is_none());
        assert!(reporter.contains(Level::WARN, "missing command"));
        assert!(reporter.contains(Level::WARN, "missing label"));
        assert!(reporter.contains(Level::WARN, "missing working directory"));
    }

    #[test]
    fn unknown_program_is_a_spawn_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = executor(MemoryReporter::shared(), 100)
            .install("ghost", &["/definitely/not/here".to_string()], temp.path())
            .expect_err("spawn fails");
        assert!(matches!(
            err.downcast_ref::<StarterError>(),
            Some(StarterError::Spawn { .. })
        ));
    }

    #[test]
    fn start_reports_early_failure_with_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = executor(MemoryReporter::shared(), 2000)
            .start("app", &sh("echo boom 1>&2; exit 4"), temp.path())
            .expect_err("start fails");
        match err.downcast_ref::<StarterError>() {
            Some(StarterError::StartFailed { code, stderr, .. }) => {
                assert_eq!(*code, Some(4));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn start_hands_back_apps_that_outlive_the_window() {
        let temp = tempfile::tempdir().expect("tempdir");
        let app = executor(MemoryReporter::shared(), 50)
            .start("app", &sh("echo hello; sleep 1; echo bye"), temp.path())
            .expect("start")
            .expect("launched");
        assert_eq!(app.label(), "app");
        assert_eq!(app.wait().expect("wait"), Some(0));
    }

    #[test]
    fn start_of_quick_successful_app_is_ok() {
        let temp = tempfile::tempdir().expect("tempdir");
        let app = executor(MemoryReporter::shared(), 2000)
            .start("app", &sh("echo done"), temp.path())
            .expect("start")
            .expect("launched");
        assert_eq!(
            app.output(),
            vec![OutputLine {
                stream: Stream::Stdout,
                text: "done".into()
            }]
        );
        assert_eq!(app.wait().expect("wait"), Some(0));
    }

    #[test]
    fn start_returns_while_a_forked_process_holds_the_pipes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let exec = executor(MemoryReporter::shared(), 1000);

        let began = Instant::now();
        let app = exec
            .start("app", &sh("echo ready; sleep 5 & exit 0"), temp.path())
            .expect("start")
            .expect("launched");
        assert!(began.elapsed() < Duration::from_millis(2500), "start blocked");
        assert!(app.output().iter().any(|line| line.text == "ready"));
        assert_eq!(app.wait().expect("wait"), Some(0));

        let began = Instant::now();
        let err = exec
            .start("app", &sh("echo boom 1>&2; sleep 5 & exit 4"), temp.path())
            .expect_err("start fails");
        assert!(began.elapsed() < Duration::from_millis(2500), "start blocked");
        assert!(matches!(
            err.downcast_ref::<StarterError>(),
            Some(StarterError::StartFailed { code: Some(4), .. })
        ));
    }

    #[test]
    fn abandoning_a_child_kills_and_reaps_it() {
        let temp = tempfile::tempdir().expect("tempdir");
        let reporter = MemoryReporter::shared();
        let exec = executor(reporter, 100);
        let (mut child, drains, _log) = exec
            .spawn("stuck", &sh("sleep 30"), temp.path())
            .expect("spawn");

        let began = Instant::now();
        exec.abandon("stuck", &mut child, drains);
        assert!(began.elapsed() < Duration::from_secs(5));
        assert!(child.try_wait().expect("status").is_some());
    }

    #[test]
    fn drains_past_their_deadline_are_detached() {
        let (_tx, rx) = std::sync::mpsc::channel::<()>();
        let blocked = thread::spawn(move || {
            let _ = rx.recv();
        });
        let finished = thread::spawn(|| {});
        let began = Instant::now();
        let joined = join_drains_until(
            vec![finished, blocked],
            Instant::now() + Duration::from_millis(100),
        )
        .expect("join");
        assert!(!joined);
        assert!(began.elapsed() < Duration::from_secs(2));
        assert!(join_drains_until(vec![thread::spawn(|| {})], Instant::now() + DRAIN_GRACE)
            .expect("join"));
    }

    #[test]
    fn launched_app_debug_shows_label_and_pid() {
        let temp = tempfile::tempdir().expect("tempdir");
        let app = executor(MemoryReporter::shared(), 2000)
            .start("web", &sh("true"), temp.path())
            .expect("start")
            .expect("launched");
        let shown = format!("{app:?}");
        assert!(shown.contains("\"web\""));
        assert!(shown.contains(&format!("pid: {}", app.id())));
    }

    #[test]
    fn decode_line_strips_line_endings() {
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"abc"), "abc");
    }
}
