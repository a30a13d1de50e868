pub mod change;
pub mod dependencies;
pub mod entrypoint;
pub mod launch;
pub mod orchestrator;
pub mod strategy;

pub use change::ChangeDetector;
pub use entrypoint::{EntryPointLocator, ENTRY_POINT_MARKER};
pub use launch::{launch, launch_with, LaunchRequest, LaunchResult};
pub use orchestrator::InstallationOrchestrator;
pub use strategy::{
    Collaborators, EntryPoints, SetupToolsStrategy, SourceLayoutStrategy, Strategy, StrategyKind,
    WheelStrategy,
};
