use atty::Stream;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use starter_core::{
    launch, to_json_response, ExecutionOutcome, GlobalOptions, LaunchRequest, LaunchedApp,
    LauncherSettings,
};
use tracing::{info, warn};

mod cli;
mod logging;
mod style;

use cli::StarterCli;
use style::Style;

const ENVIRONMENT_FOLDER: &str = "app_environment";

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = StarterCli::parse();
    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
    };

    let mut settings = LauncherSettings::from_env().map_err(|err| eyre!("{err:#}"))?;
    if let Some(root) = &cli.environment_root {
        settings = settings.with_environment_root(root);
    }
    let guard =
        logging::init_tracing(&global, &settings.environment_root().join(ENVIRONMENT_FOLDER))?;
    info!(root = %settings.environment_root().display(), "starting app starter");

    let request = LaunchRequest {
        app_path: cli.app_path.clone(),
        clear_environment: cli.clear_environment,
        app_params: cli.app_params.clone(),
        main_file: cli.main_file.clone(),
    };
    let result = launch(&settings, &request);
    let code = emit_output(&cli, &result.outcome)?;
    wait_for_apps(result.running);

    drop(guard);
    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn emit_output(cli: &StarterCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&to_json_response(outcome))?);
    } else if !cli.quiet {
        println!("{}", style.status(outcome.status, &outcome.message));
        if let Some(reason) = error_from_details(&outcome.details) {
            println!("{}", style.info(reason));
        }
    }

    Ok(code)
}

fn error_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("error"))
        .and_then(Value::as_str)
}

/// Relay output of apps that outlived their start window until they exit.
///
/// The apps' stdout and stderr are pipes read by this process. Exiting early
/// would close the read ends, and an app's next write would fail with a
/// broken pipe, so the launcher stays up as the apps' log relay.
fn wait_for_apps(running: Vec<LaunchedApp>) {
    for app in running {
        let label = app.label().to_string();
        info!(app = %label, pid = app.id(), "app running; relaying its output");
        match app.wait() {
            Ok(Some(code)) => info!(app = %label, code, "app exited"),
            Ok(None) => info!(app = %label, "app terminated by a signal"),
            Err(err) => warn!(app = %label, error = %format!("{err:#}"), "lost track of app"),
        }
    }
}
