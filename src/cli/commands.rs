use crate::{
    cli::args::{RunArgs, SimulateArgs, TuiArgs},
    core::{
        session_log::write_session_log, DefaultErrorReporter, Dispatcher, ErrorReporter,
        MultiMenuConfig, ToolState, WorkerEvent,
    },
    monitor::{self, load_catalog},
    tools::{
        simulator::{run_simulator, SimulatorOptions},
        LaunchRequest, Launcher, ProcessWorker,
    },
    Result,
};
use anyhow::anyhow;
use std::collections::HashMap;
use std::env;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Handles `multimenu tui`.
pub async fn tui(config: MultiMenuConfig, args: TuiArgs) -> Result<()> {
    monitor::run(config, args).await
}

/// Handles `multimenu list` by printing the discovered catalog.
pub async fn list(config: MultiMenuConfig) -> Result<()> {
    let catalog = load_catalog(&config, &[])?;
    println!("Tools in {}:", config.tools.dir.display());
    for tool in catalog.iter() {
        let kind = match tool.manifest.synthetic_tasks {
            Some(count) => format!("test tool, {} synthetic tasks", count),
            None => "file tool".to_string(),
        };
        println!("  {:<24} {} ({})", tool.name, tool.path.display(), kind);
        println!("      results: {}", tool.manifest.results_header);
        println!("      errors:  {}", tool.manifest.errors_header);
    }
    Ok(())
}

/// Handles `multimenu run`: start every requested tool, then drain until all settle.
pub async fn run(config: MultiMenuConfig, args: RunArgs) -> Result<()> {
    let catalog = load_catalog(&config, &args.tools)?;
    let (event_tx, event_rx) = unbounded_channel();
    let launcher = Launcher::new(catalog, config.inputs.allowed_extensions.clone(), event_tx)?;
    let mut dispatcher = Dispatcher::new(config.dispatch.cpu_threads, config.dispatch.settings()?);

    for tool in &args.tools {
        let request = LaunchRequest {
            tool: tool.clone(),
            cpus: args.cpus,
            input_dir: args.input.clone(),
            output_dir: args.output.clone(),
            log_only: args.log_only,
        };
        let started = match dispatcher.select_cpus(tool, args.cpus) {
            Ok(()) => launcher.start(&mut dispatcher, &request).await,
            Err(err) => Err(err),
        };
        match started {
            Ok(run_id) => {
                tracing::info!(tool = %tool, run_id = %run_id, cpus = args.cpus, "tool started");
                println!("{}: started on {} CPU thread(s)", tool, args.cpus);
            }
            Err(err) => {
                dispatcher.shutdown();
                DefaultErrorReporter::new().report_error(&err);
                return Err(anyhow!("{} could not be started", tool));
            }
        }
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    let tick = config.dispatch.tick();
    let dispatcher = tokio::task::spawn_blocking(move || {
        drain_until_settled(dispatcher, event_rx, tick, &interrupted)
    })
    .await?;
    ctrl_c.abort();

    let mut killed = Vec::new();
    for tool in &args.tools {
        let Some(run) = dispatcher.run(tool) else {
            continue;
        };
        println!(
            "{}: {} ({} completed, {} errors, {} lost of {})",
            tool,
            run.state,
            run.completed,
            run.errors,
            run.lost,
            run.assigned()
        );
        if let Some(dir) = &args.log_dir {
            let path = write_session_log(dir, tool, run)?;
            println!("{}: session log written to {}", tool, path.display());
        }
        if run.state == ToolState::Killed {
            killed.push(tool.clone());
        }
    }

    if killed.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("Killed before completion: {}", killed.join(", ")))
    }
}

/// Tick the dispatcher until no tool is running, echoing status changes.
fn drain_until_settled(
    mut dispatcher: Dispatcher<ProcessWorker>,
    mut events: UnboundedReceiver<WorkerEvent>,
    tick: Duration,
    interrupted: &AtomicBool,
) -> Dispatcher<ProcessWorker> {
    let mut last_status: HashMap<String, String> = HashMap::new();
    let mut kill_sent = false;

    while dispatcher.any_running() {
        std::thread::sleep(tick);

        if !kill_sent && interrupted.load(Ordering::SeqCst) {
            let running: Vec<String> = dispatcher
                .runs()
                .filter(|run| run.state == ToolState::Running)
                .map(|run| run.tool.clone())
                .collect();
            for tool in running {
                if let Err(err) = dispatcher.kill(&tool) {
                    tracing::warn!(tool = %tool, "kill failed: {}", err);
                }
            }
            kill_sent = true;
        }

        let report = dispatcher.tick(&mut events);
        if report.dropped > 0 {
            tracing::debug!(dropped = report.dropped, "discarded unattributed messages");
        }
        for run in dispatcher.runs() {
            if last_status.get(&run.tool) != Some(&run.status) {
                println!("{}: {}", run.tool, run.status);
                last_status.insert(run.tool.clone(), run.status.clone());
            }
        }
        for transition in report.transitions {
            tracing::info!(tool = %transition.tool, state = %transition.state, "tool settled");
        }
    }
    dispatcher
}

/// Handles the hidden `multimenu simulate` worker command.
pub async fn simulate(args: SimulateArgs) -> Result<()> {
    let tool = args
        .tool
        .or_else(|| env::var("MULTIMENU_TOOL").ok())
        .ok_or_else(|| anyhow!("simulate needs --tool or MULTIMENU_TOOL"))?;
    let options = SimulatorOptions {
        tool,
        max_delay: Duration::from_millis(args.max_delay_ms),
        error_rate: args.error_rate.clamp(0.0, 1.0),
        format: args.format,
    };

    let written = tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let stdout = io::stdout();
        run_simulator(&options, stdin.lock(), stdout.lock(), &mut rand::thread_rng())
    })
    .await??;
    tracing::debug!(messages = written, "simulator finished");
    Ok(())
}
