use std::path::Path;

use color_eyre::{eyre::eyre, Result};
use starter_core::GlobalOptions;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "STARTER_LOG";
const LOG_FILE_PREFIX: &str = "app_starter";
const LOG_FILE_SUFFIX: &str = "log";

fn level(global: &GlobalOptions) -> &'static str {
    if global.trace {
        return "trace";
    }
    match global.verbose {
        0 if global.quiet => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install stderr logging plus a daily rolling file in `log_dir`. The
/// returned guard flushes the file writer and must live until exit.
///
/// # Errors
/// Fails when a global subscriber is already installed.
pub fn init_tracing(global: &GlobalOptions, log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let level = level(global);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,starter={level},starter_core={level},app_starter={level}"
        ))
    });
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    let (file_layer, guard) = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(log_dir)
    {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(err) => {
            eprintln!("app-starter: file logging disabled: {err}");
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| eyre!("cannot install the log subscriber: {err}"))?;
    Ok(guard)
}
