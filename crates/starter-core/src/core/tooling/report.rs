//! Reporting capability handed to strategies, scanners and the executor.
//!
//! Code in this crate logs through an injected [`Reporter`] instead of the
//! process-wide subscriber, so the same paths can run in tests against a
//! [`MemoryReporter`].

use std::sync::{Arc, Mutex};

use tracing::Level;

pub trait Reporter: Send + Sync {
    fn report(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.report(Level::DEBUG, message);
    }

    fn info(&self, message: &str) {
        self.report(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.report(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.report(Level::ERROR, message);
    }
}

/// Forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, level: Level, message: &str) {
        match level {
            Level::TRACE => tracing::trace!(target: "starter", "{message}"),
            Level::DEBUG => tracing::debug!(target: "starter", "{message}"),
            Level::INFO => tracing::info!(target: "starter", "{message}"),
            Level::WARN => tracing::warn!(target: "starter", "{message}"),
            _ => tracing::error!(target: "starter", "{message}"),
        }
    }
}

/// Keeps every reported line in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemoryReporter {
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(seen, line)| *seen == level && line.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

pub(crate) fn tracing_reporter() -> Arc<dyn Reporter> {
    Arc::new(TracingReporter)
}
