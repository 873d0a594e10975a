pub mod args;
pub mod commands;

pub use args::{RunArgs, SimulateArgs, TuiArgs};
use crate::core::{ConfigLoader, ConfigValidator, MultiMenuConfig};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "multimenu")]
#[command(version = crate::VERSION)]
#[command(about = "Fan tool plugins out over worker processes and watch them finish")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: drop tool manifests into Tools/, open the TUI, pick folders and CPU threads, press s."
)]
pub struct Args {
    /// Config file to load instead of ./multimenu.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding tool manifests (overrides the config file)
    #[arg(long, global = true, value_name = "DIR")]
    pub tools_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Open the interactive tool menu",
        long_about = "Tui shows one tab per discovered tool with its CPU selection, folders, progress, results and errors.",
        after_help = "Example:\n    multimenu tui --input ./scans --output ./converted"
    )]
    Tui(TuiArgs),
    #[command(
        about = "Run tools without the TUI",
        long_about = "Run starts every requested tool, drains results until each completes or is killed, then optionally writes session logs. Ctrl-C kills running tools.",
        after_help = "Example:\n    multimenu run --tool taskOneFix --cpus 4 --log-dir ./logs"
    )]
    Run(RunArgs),
    #[command(
        about = "List discovered tools",
        after_help = "Example:\n    multimenu list --tools-dir ./Tools"
    )]
    List,
    #[command(hide = true, about = "Built-in test worker that answers items read from stdin")]
    Simulate(SimulateArgs),
}

/// Resolve the effective configuration for a parsed command line.
#[allow(clippy::result_large_err)]
pub fn load_config(args: &Args) -> Result<MultiMenuConfig, crate::core::AppError> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load(path)?,
        None => ConfigLoader::load_from_workspace(&env::current_dir()?)?,
    };
    if let Some(dir) = &args.tools_dir {
        config.tools.dir = dir.clone();
    }
    ConfigValidator::validate(&config)?;
    Ok(config)
}

pub async fn run(args: Args) -> crate::Result<()> {
    if let Command::Simulate(simulate_args) = args.command {
        return commands::simulate(simulate_args).await;
    }

    let config = load_config(&args)?;
    tracing::debug!(tools_dir = %config.tools.dir.display(), "configuration loaded");
    match args.command {
        Command::Tui(tui_args) => commands::tui(config, tui_args).await,
        Command::Run(run_args) => commands::run(config, run_args).await,
        Command::List => commands::list(config).await,
        Command::Simulate(_) => Ok(()),
    }
}
