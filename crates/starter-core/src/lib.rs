#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

mod core;

pub(crate) use crate::core::{app, config, fs, layout, runtime, tooling};

pub use crate::core::app::{
    launch, launch_with, ChangeDetector, Collaborators, EntryPointLocator, EntryPoints,
    InstallationOrchestrator, LaunchRequest, LaunchResult, SetupToolsStrategy,
    SourceLayoutStrategy, Strategy, StrategyKind, WheelStrategy, ENTRY_POINT_MARKER,
};
pub use crate::core::app::dependencies::{requirement_dependencies, SetupFile};
pub use crate::core::app::strategy::EDITABLE_INSTALL_ARGS;
pub use crate::core::config::{
    ConfigStore, ContextStore, GlobalOptions, JsonConfigStore, LauncherSettings, VenvContext,
};
pub use crate::core::layout::{folder_is_empty, EnvironmentLayout};
pub use crate::core::runtime::{
    prepare_venv, split_params, venv_context_for, LaunchedApp, OutputLine, PlatformHandler,
    ProcessExecutor, RunOutput, Stream, SystemPlatform,
};
pub use crate::core::tooling::errors::StarterError;
pub use crate::core::tooling::outcome::{to_json_response, CommandStatus, ExecutionOutcome};
pub use crate::core::tooling::report::{MemoryReporter, Reporter, TracingReporter};

pub use starter_domain::FileManifest;
