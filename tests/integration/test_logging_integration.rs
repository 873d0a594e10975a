use clap::Parser;
use multimenu::cli::{Args, Command};
use multimenu::logging::config::LoggingConfig;
use multimenu::logging::layers::console::select_console_output;
use multimenu::logging::{self, detect_context, reset_for_tests, ConsoleOutput, ExecutionContext};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::tempdir;
use tracing::info;

fn clear_logging_env() {
    for v in &["MULTIMENU_LOG_DIR", "MULTIMENU_LOG_LEVEL", "MULTIMENU_LOG_CONSOLE", "RUST_LOG"] {
        env::remove_var(v);
    }
}

// The global subscriber can only be installed once per process, so this is
// the only test in this binary that calls `logging::init`.
#[test]
#[serial]
fn tui_context_logs_to_workspace_file_only() {
    clear_logging_env();
    reset_for_tests();
    let original_dir = env::current_dir().unwrap();
    let workspace = tempdir().unwrap();
    env::set_current_dir(workspace.path()).unwrap();

    let args = Args::parse_from(["multimenu", "tui", "--tools", "taskOneFix"]);
    let guard = logging::init(&args.command).unwrap();

    info!("tui integration event");

    assert_eq!(guard.context(), ExecutionContext::Tui);
    assert_eq!(guard.console_output(), ConsoleOutput::None);
    let log_path = guard.log_file_path().to_path_buf();
    drop(guard);

    env::set_current_dir(original_dir).unwrap();
    assert!(log_path.ends_with(".multimenu/logs/multimenu.log"));
    let contents = fs::read_to_string(log_path).unwrap();
    assert!(contents.contains("tui integration event"));

    assert!(logging::init(&args.command).is_err());
}

#[test]
fn worker_and_tui_never_log_to_console() {
    let simulate = Args::parse_from(["multimenu", "simulate", "--tool", "taskOneFix"]);
    assert_eq!(detect_context(&simulate.command), ExecutionContext::Worker);
    assert_eq!(
        select_console_output(ExecutionContext::Worker, Some(ConsoleOutput::Stdout)),
        ConsoleOutput::None
    );

    let run = Args::parse_from(["multimenu", "run", "--tool", "taskOneFix"]);
    assert_eq!(detect_context(&run.command), ExecutionContext::LocalDev);
    assert_eq!(
        select_console_output(ExecutionContext::LocalDev, None),
        ConsoleOutput::Stderr
    );
    assert!(matches!(
        Args::parse_from(["multimenu", "list"]).command,
        Command::List
    ));
}

#[test]
#[serial]
fn workspace_logging_file_and_env_precedence() {
    clear_logging_env();
    let workspace = tempdir().unwrap();
    let config_dir = workspace.path().join(".multimenu").join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("logging.toml"),
        "[logging]\ndefault_level = \"debug\"\nconsole_output = \"stdout\"\nenable_file = false\n",
    )
    .unwrap();

    let config = LoggingConfig::load(Some(workspace.path())).unwrap();
    assert_eq!(config.default_level, "debug");
    assert_eq!(config.console_output, Some(ConsoleOutput::Stdout));
    assert!(!config.enable_file);

    env::set_var("MULTIMENU_LOG_LEVEL", "warn");
    env::set_var("MULTIMENU_LOG_CONSOLE", "none");
    let config = LoggingConfig::load(Some(workspace.path())).unwrap();
    clear_logging_env();
    assert_eq!(config.default_level, "warn");
    assert_eq!(config.console_output, Some(ConsoleOutput::None));
}

#[test]
#[serial]
fn invalid_console_override_is_rejected() {
    clear_logging_env();
    env::set_var("MULTIMENU_LOG_CONSOLE", "printer");
    let result = LoggingConfig::load(None);
    clear_logging_env();
    assert!(result.is_err());
}
