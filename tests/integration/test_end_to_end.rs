use assert_cmd::Command;
use multimenu::core::{DispatchSettings, Dispatcher, ToolState, WorkerEvent};
use multimenu::tools::{LaunchRequest, Launcher, ProcessWorker, ToolCatalog};
use predicates::prelude::*;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

const BIN: &str = env!("CARGO_BIN_EXE_multimenu");

fn write_tool(dir: &Path, stem: &str, max_delay_ms: u64, tasks: usize) {
    let manifest = format!(
        r#"command = ["{{self}}", "simulate", "--max-delay-ms", "{}"]
results_header = "Random Task Number | Random Decimal One | Random Decimal Two | Random Decimal Three"
errors_header = "Random Task Number | Error Message"
synthetic_tasks = {}
"#,
        max_delay_ms, tasks
    );
    fs::write(dir.join(format!("{}.toml", stem)), manifest).unwrap();
}

/// A tool whose single worker runs `script` under `sh`.
#[cfg(unix)]
fn write_script_tool(dir: &Path, stem: &str, script: &str, tasks: usize) {
    let manifest = format!(
        "command = [\"sh\", \"-c\", '''{}''']\nsynthetic_tasks = {}\n",
        script, tasks
    );
    fs::write(dir.join(format!("{}.toml", stem)), manifest).unwrap();
}

fn launcher(tools_dir: &Path) -> (Launcher, UnboundedReceiver<WorkerEvent>) {
    let catalog = ToolCatalog::discover(tools_dir).unwrap();
    let (tx, rx) = unbounded_channel();
    let launcher = Launcher::new(catalog, vec!["tif".to_string()], tx)
        .unwrap()
        .with_self_exe(BIN);
    (launcher, rx)
}

/// Tick on a blocking thread until `done` holds or the deadline passes.
async fn tick_until<F>(
    dispatcher: Dispatcher<ProcessWorker>,
    events: UnboundedReceiver<WorkerEvent>,
    deadline: Duration,
    done: F,
) -> (Dispatcher<ProcessWorker>, UnboundedReceiver<WorkerEvent>)
where
    F: Fn(&Dispatcher<ProcessWorker>) -> bool + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut dispatcher = dispatcher;
        let mut events = events;
        let started = Instant::now();
        while !done(&dispatcher) && started.elapsed() < deadline {
            std::thread::sleep(Duration::from_millis(20));
            dispatcher.tick(&mut events);
        }
        (dispatcher, events)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn synthetic_tool_completes_across_four_workers() {
    let workspace = TempDir::new().unwrap();
    env::set_var("MULTIMENU_LOG_DIR", workspace.path().join("logs"));
    write_tool(workspace.path(), "1taskOneFix", 5, 100);

    let (launcher, events) = launcher(workspace.path());
    let mut dispatcher = Dispatcher::new(4, DispatchSettings::default());
    dispatcher.select_cpus("taskOneFix", 4).unwrap();
    let request = LaunchRequest {
        tool: "taskOneFix".to_string(),
        cpus: 4,
        ..LaunchRequest::default()
    };
    launcher.start(&mut dispatcher, &request).await.unwrap();
    assert_eq!(dispatcher.state("taskOneFix"), ToolState::Running);
    assert_eq!(dispatcher.run("taskOneFix").unwrap().worker_count(), 4);

    let (dispatcher, _events) = tick_until(dispatcher, events, Duration::from_secs(60), |d| {
        d.state("taskOneFix") == ToolState::Completed
    })
    .await;

    let run = dispatcher.run("taskOneFix").unwrap();
    assert_eq!(run.state, ToolState::Completed);
    assert_eq!(run.completed + run.errors, 100);
    assert_eq!(run.lost, 0);
    assert_eq!(run.result_rows.len(), run.completed);
    assert_eq!(run.error_rows.len(), run.errors);
    assert_eq!(run.progress_percent(), 100);
    env::remove_var("MULTIMENU_LOG_DIR");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn each_worker_receives_a_quarter_of_the_tasks() {
    let workspace = TempDir::new().unwrap();
    env::set_var("MULTIMENU_LOG_DIR", workspace.path().join("logs"));
    write_tool(workspace.path(), "1taskOneFix", 1, 100);

    let (launcher, mut events) = launcher(workspace.path());
    let dispatcher: Dispatcher<ProcessWorker> = Dispatcher::new(4, DispatchSettings::default());
    let request = LaunchRequest {
        tool: "taskOneFix".to_string(),
        cpus: 4,
        ..LaunchRequest::default()
    };
    let (plan, _workers) = launcher.launch(&dispatcher, &request).await.unwrap();
    assert_eq!(plan.assigned.len(), 100);

    let mut lines = [0usize; 4];
    let mut exited = 0;
    while exited < 4 {
        let event = tokio::time::timeout(Duration::from_secs(60), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            WorkerEvent::Line { worker, .. } => lines[worker.index] += 1,
            WorkerEvent::Exited { .. } => exited += 1,
        }
    }
    assert_eq!(lines, [25, 25, 25, 25]);
    env::remove_var("MULTIMENU_LOG_DIR");
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn invalid_utf8_output_keeps_later_results() {
    let workspace = TempDir::new().unwrap();
    env::set_var("MULTIMENU_LOG_DIR", workspace.path().join("logs"));
    write_script_tool(
        workspace.path(),
        "badBytes",
        r"printf 'badBytescaf\351.tif\n'; printf 'badBytesb\n'; printf 'badBytesc\n'",
        3,
    );

    let (launcher, events) = launcher(workspace.path());
    let mut dispatcher = Dispatcher::new(1, DispatchSettings::default());
    dispatcher.select_cpus("badBytes", 1).unwrap();
    let request = LaunchRequest {
        tool: "badBytes".to_string(),
        cpus: 1,
        ..LaunchRequest::default()
    };
    launcher.start(&mut dispatcher, &request).await.unwrap();

    let (dispatcher, _events) = tick_until(dispatcher, events, Duration::from_secs(20), |d| {
        d.state("badBytes") == ToolState::Completed
    })
    .await;

    let run = dispatcher.run("badBytes").unwrap();
    assert_eq!(run.state, ToolState::Completed);
    assert_eq!(run.completed, 3);
    assert_eq!(run.lost, 0);
    env::remove_var("MULTIMENU_LOG_DIR");
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn noisy_stderr_does_not_block_the_worker() {
    let workspace = TempDir::new().unwrap();
    env::set_var("MULTIMENU_LOG_DIR", workspace.path().join("logs"));
    write_script_tool(
        workspace.path(),
        "noisy",
        r#"printf '\377\n' >&2; i=0; while [ $i -lt 3000 ]; do echo "stderr noise line $i padded out to sixty characters" >&2; i=$((i+1)); done; printf 'noisya\nnoisyb\nnoisyc\n'"#,
        3,
    );

    let (launcher, events) = launcher(workspace.path());
    let mut dispatcher = Dispatcher::new(1, DispatchSettings::default());
    dispatcher.select_cpus("noisy", 1).unwrap();
    let request = LaunchRequest {
        tool: "noisy".to_string(),
        cpus: 1,
        ..LaunchRequest::default()
    };
    launcher.start(&mut dispatcher, &request).await.unwrap();

    let (dispatcher, _events) = tick_until(dispatcher, events, Duration::from_secs(30), |d| {
        d.state("noisy") == ToolState::Completed
    })
    .await;

    let run = dispatcher.run("noisy").unwrap();
    assert_eq!(run.state, ToolState::Completed);
    assert_eq!(run.completed, 3);
    assert_eq!(run.lost, 0);
    env::remove_var("MULTIMENU_LOG_DIR");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn killed_tool_stops_its_workers() {
    let workspace = TempDir::new().unwrap();
    env::set_var("MULTIMENU_LOG_DIR", workspace.path().join("logs"));
    write_tool(workspace.path(), "1taskOneFix", 60_000, 100);

    let (launcher, events) = launcher(workspace.path());
    let mut dispatcher = Dispatcher::new(2, DispatchSettings::default());
    dispatcher.select_cpus("taskOneFix", 2).unwrap();
    let request = LaunchRequest {
        tool: "taskOneFix".to_string(),
        cpus: 2,
        ..LaunchRequest::default()
    };
    launcher.start(&mut dispatcher, &request).await.unwrap();
    dispatcher.kill("taskOneFix").unwrap();

    let (dispatcher, _events) = tick_until(dispatcher, events, Duration::from_secs(20), |d| {
        d.run("taskOneFix")
            .map(|run| run.state == ToolState::Killed && run.live_workers() == 0)
            .unwrap_or(false)
    })
    .await;

    let run = dispatcher.run("taskOneFix").unwrap();
    assert_eq!(run.state, ToolState::Killed);
    assert_eq!(run.live_workers(), 0);
    assert!(run.accounted() < 100);
    assert!(run.controls_enabled);
    env::remove_var("MULTIMENU_LOG_DIR");
}

#[test]
#[serial]
fn list_prints_discovered_tools() {
    let workspace = TempDir::new().unwrap();
    write_tool(workspace.path(), "1taskOneFix", 5, 100);
    write_tool(workspace.path(), "3taskThreeFix", 5, 100);

    Command::cargo_bin("multimenu")
        .unwrap()
        .current_dir(workspace.path())
        .env("MULTIMENU_LOG_DIR", workspace.path().join("logs"))
        .args(["--tools-dir", ".", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("taskOneFix").and(predicate::str::contains("taskThreeFix")));
}

#[test]
#[serial]
fn headless_run_completes_and_writes_session_log() {
    let workspace = TempDir::new().unwrap();
    let tools = workspace.path().join("Tools");
    let logs = workspace.path().join("session-logs");
    fs::create_dir_all(&tools).unwrap();
    fs::create_dir_all(&logs).unwrap();
    write_tool(&tools, "1taskOneFix", 5, 40);

    Command::cargo_bin("multimenu")
        .unwrap()
        .current_dir(workspace.path())
        .env("MULTIMENU_CPU_THREADS", "4")
        .env("MULTIMENU_TICK_MS", "20")
        .env("MULTIMENU_LOG_DIR", workspace.path().join("logs"))
        .args(["run", "--tool", "taskOneFix", "--cpus", "2", "--log-dir"])
        .arg(&logs)
        .timeout(Duration::from_secs(60))
        .assert()
        .success()
        .stdout(predicate::str::contains("taskOneFix: completed"));

    let written: Vec<_> = fs::read_dir(&logs).unwrap().collect();
    assert_eq!(written.len(), 1);
    let contents = fs::read_to_string(written[0].as_ref().unwrap().path()).unwrap();
    assert!(contents.starts_with("taskOneFix time started: "));
    assert!(contents.contains("Random Task Number | Error Message"));
}

#[test]
#[serial]
fn headless_run_rejects_unknown_tool() {
    let workspace = TempDir::new().unwrap();
    write_tool(workspace.path(), "1taskOneFix", 5, 10);

    Command::cargo_bin("multimenu")
        .unwrap()
        .current_dir(workspace.path())
        .env("MULTIMENU_LOG_DIR", workspace.path().join("logs"))
        .args(["--tools-dir", ".", "run", "--tool", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown tool: nope"));
}
