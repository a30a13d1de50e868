use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const STARTER_ABOUT: &str =
    "Prepare an isolated venv for a Python app (wheel, setup.py or pyproject \
     source tree) and start it.";

#[derive(Parser, Debug)]
#[command(name = "app-starter", author, version, about = STARTER_ABOUT)]
#[allow(clippy::struct_excessive_bools)]
pub struct StarterCli {
    #[arg(
        long,
        value_name = "PATH",
        help = "Folder holding the app; remembered for later runs"
    )]
    pub app_path: Option<PathBuf>,
    #[arg(long, help = "Throw the venv away and install everything again")]
    pub clear_environment: bool,
    #[arg(
        long,
        value_name = "STRING",
        allow_hyphen_values = true,
        help = "Arguments passed to the app; remembered for later runs"
    )]
    pub app_params: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Where app_environment/ lives (default: next to the launcher, or STARTER_ENV_ROOT)"
    )]
    pub environment_root: Option<PathBuf>,
    #[arg(
        long,
        value_name = "NAME",
        help = "Start files with this name instead of scanning for __main__ guards"
    )]
    pub main_file: Option<String>,
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)"
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    pub trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes")]
    pub json: bool,
    #[arg(long, help = "Disable colored human output")]
    pub no_color: bool,
}
