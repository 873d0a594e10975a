//! Interactive front end: one tab per tool, drained on a fixed tick by a ratatui loop.
pub mod event;
pub mod state;
pub mod ui;

use crate::cli::args::TuiArgs;
use crate::core::config::MultiMenuConfig;
use crate::core::dispatcher::Dispatcher;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::monitor::state::MenuState;
use crate::monitor::ui::TuiSession;
use crate::tools::{Launcher, ToolCatalog};
use crate::Result;
use std::env;
use tokio::sync::mpsc::unbounded_channel;

/// Load the tool catalog honoring an optional `--tools` restriction.
pub fn load_catalog(config: &MultiMenuConfig, only: &[String]) -> Result<ToolCatalog> {
    let catalog = ToolCatalog::discover(&config.tools.dir)?;
    let catalog = if only.is_empty() {
        catalog
    } else {
        catalog.restrict_to(only)?
    };
    if catalog.is_empty() {
        return Err(AppError::new(
            ErrorCategory::ConfigError,
            format!("No tools found in {}", config.tools.dir.display()),
        )
        .with_code("TOOLS-003")
        .with_suggestion("Add a tool manifest such as 1taskOneFix.toml to the tools directory")
        .into());
    }
    Ok(catalog)
}

/// Run the TUI until the operator quits.
pub async fn run(config: MultiMenuConfig, args: TuiArgs) -> Result<()> {
    let catalog = load_catalog(&config, &args.tools)?;
    tracing::info!(tools = catalog.len(), "starting multimenu TUI");

    let log_dir = match args.log_dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    let state = MenuState::new(&catalog, args.input, args.output, log_dir);

    let (event_tx, event_rx) = unbounded_channel();
    let launcher = Launcher::new(catalog, config.inputs.allowed_extensions.clone(), event_tx)?;
    let dispatcher = Dispatcher::new(config.dispatch.cpu_threads, config.dispatch.settings()?);

    let session = TuiSession {
        launcher,
        dispatcher,
        events: event_rx,
        state,
        tick: config.dispatch.tick(),
        runtime: tokio::runtime::Handle::current(),
    };

    tokio::task::spawn_blocking(move || ui::run_tui(session)).await??;
    tracing::info!("multimenu TUI closed");
    Ok(())
}
