//! One launcher run: prepare the environment, pick a strategy, install when
//! needed and start the app.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use super::orchestrator::InstallationOrchestrator;
use super::strategy::{Collaborators, StrategyKind};
use crate::config::{ContextStore, JsonConfigStore, LauncherSettings};
use crate::layout::EnvironmentLayout;
use crate::runtime::{prepare_venv, LaunchedApp, ProcessExecutor, SystemPlatform};
use crate::tooling::outcome::ExecutionOutcome;
use crate::tooling::report::{tracing_reporter, Reporter};

#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    pub app_path: Option<PathBuf>,
    pub clear_environment: bool,
    pub app_params: Option<String>,
    pub main_file: Option<String>,
}

pub struct LaunchResult {
    pub outcome: ExecutionOutcome,
    /// Strategy that installed or started the app.
    pub handled: Option<StrategyKind>,
    /// Apps still running once their start window closed.
    pub running: Vec<LaunchedApp>,
}

impl LaunchResult {
    fn finished(outcome: ExecutionOutcome) -> Self {
        Self {
            outcome,
            handled: None,
            running: Vec::new(),
        }
    }
}

/// Launch with logging routed to `tracing`.
pub fn launch(settings: &LauncherSettings, request: &LaunchRequest) -> LaunchResult {
    launch_with(settings, request, &tracing_reporter())
}

/// Launch reporting through `reporter`. Failures are folded into the
/// outcome; the environment is then cleared except for the app folder so the
/// next run starts fresh.
pub fn launch_with(
    settings: &LauncherSettings,
    request: &LaunchRequest,
    reporter: &Arc<dyn Reporter>,
) -> LaunchResult {
    let mut layout = EnvironmentLayout::new(settings.environment_root());
    match run_launch(settings, request, &mut layout, reporter) {
        Ok(result) => result,
        Err(err) => {
            reporter.error(&format!("preparing the app failed: {err:#}"));
            reporter.info("removing everything except the app folder");
            if let Err(clear) = layout.clear_except_app_folder() {
                reporter.error(&format!("cannot clear the environment: {clear:#}"));
            }
            LaunchResult::finished(ExecutionOutcome::from_error(&err))
        }
    }
}

fn run_launch(
    settings: &LauncherSettings,
    request: &LaunchRequest,
    layout: &mut EnvironmentLayout,
    reporter: &Arc<dyn Reporter>,
) -> Result<LaunchResult> {
    layout.prepare()?;
    let config = Arc::new(JsonConfigStore::open(layout.config_file()));
    let contexts = Arc::new(ContextStore::open(layout.context_file()));

    let app_folder = resolve_app_folder(request, &config, layout)?;
    layout.set_app_folder(app_folder.clone());
    store_request(request, &config)?;
    reporter.info(&format!("app folder: {}", app_folder.display()));

    let executor = ProcessExecutor::new(Arc::clone(reporter), settings.start_window());
    let platform = Arc::new(SystemPlatform::new(
        Arc::clone(&contexts),
        executor.clone(),
        Arc::clone(reporter),
    ));
    let collaborators = Collaborators::new(
        app_folder.clone(),
        layout.venv_folder(),
        config.clone(),
        Arc::clone(reporter),
    )?
    .with_platform(platform.clone())
    .with_contexts(Arc::clone(&contexts));
    let orchestrator = InstallationOrchestrator::new(&collaborators);

    let Some(claimant) = orchestrator.claimant().map(|strategy| strategy.kind()) else {
        reporter.warn(&format!(
            "nothing to launch: {} holds no recognised app",
            app_folder.display()
        ));
        return Ok(LaunchResult::finished(ExecutionOutcome::success(
            "nothing to launch",
            json!({ "app_folder": app_folder.display().to_string(), "strategy": null }),
        )));
    };

    let start_fresh = request.clear_environment || orchestrator.detect_drift()?;
    if start_fresh {
        reporter.info("clearing the environment for a fresh install");
        reset_environment(layout, &config, &contexts)?;
        store_request(request, &config)?;
    }

    prepare_venv(layout, &contexts, settings, &executor, &*platform)?;
    let handled = orchestrator.run(start_fresh)?;
    let running = platform.take_launched();
    let outcome = ExecutionOutcome::success(
        format!("started app from {}", app_folder.display()),
        json!({
            "app_folder": app_folder.display().to_string(),
            "strategy": handled.unwrap_or(claimant).as_str(),
            "start_fresh": start_fresh,
            "running": running.len(),
        }),
    );
    Ok(LaunchResult {
        outcome,
        handled,
        running,
    })
}

fn resolve_app_folder(
    request: &LaunchRequest,
    config: &JsonConfigStore,
    layout: &EnvironmentLayout,
) -> Result<PathBuf> {
    if let Some(path) = &request.app_path {
        let path = std::path::absolute(path)
            .with_context(|| format!("cannot resolve app path {}", path.display()))?;
        config.set_app_folder(&path)?;
        return Ok(path);
    }
    Ok(config
        .app_folder()
        .map_or_else(|| layout.app_folder().to_path_buf(), PathBuf::from))
}

fn store_request(request: &LaunchRequest, config: &JsonConfigStore) -> Result<()> {
    if let Some(params) = request.app_params.as_deref().filter(|params| !params.is_empty()) {
        config.set_app_params(params)?;
    }
    if let Some(main_file) = request.main_file.as_deref() {
        config.set_main_file(main_file)?;
    }
    Ok(())
}

fn reset_environment(
    layout: &EnvironmentLayout,
    config: &JsonConfigStore,
    contexts: &ContextStore,
) -> Result<()> {
    layout.remove_venv_folder()?;
    layout.prepare_venv_folder()?;
    layout.remove_context_file()?;
    layout.prepare_context_file()?;
    config.clean()?;
    layout.prepare()?;
    contexts.set_path(layout.context_file());
    config.reload();
    Ok(())
}
