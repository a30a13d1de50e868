pub mod platform;
pub mod process;
pub mod venv;

pub use platform::{split_params, PlatformHandler, SystemPlatform};
pub use process::{LaunchedApp, OutputLine, ProcessExecutor, RunOutput, Stream};
pub use venv::{prepare_venv, venv_context_for};
