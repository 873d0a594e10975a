use clap::Parser;
use multimenu::cli::{load_config, Args};
use multimenu::core::config::ConfigLoader;
use multimenu::core::{ConfigValidator, ErrorCategory};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn clear_multimenu_env() {
    for v in &[
        "MULTIMENU_TOOLS_DIR",
        "MULTIMENU_ALLOWED_EXTENSIONS",
        "MULTIMENU_TICK_MS",
        "MULTIMENU_JOIN_TIMEOUT_MS",
        "MULTIMENU_CPU_THREADS",
        "MULTIMENU_STALL_TIMEOUT",
    ] {
        env::remove_var(v);
    }
}

/// Test integration of config loading with environment variables
#[test]
#[serial]
fn test_config_loading_integration() {
    clear_multimenu_env();
    let temp_dir = TempDir::new().unwrap();
    let workspace_path = temp_dir.path();

    let config_content = r#"
[tools]
dir = "plugins"

[inputs]
allowed_extensions = ["tif", "jp2"]

[dispatch]
tick_ms = 50
join_timeout_ms = 250
cpu_threads = 12
stall_timeout = "10m"
"#;
    fs::write(workspace_path.join("multimenu.toml"), config_content).unwrap();

    let config = ConfigLoader::load_from_workspace(workspace_path).unwrap();

    assert_eq!(config.tools.dir, PathBuf::from("plugins"));
    assert_eq!(config.inputs.allowed_extensions, vec!["tif", "jp2"]);
    assert_eq!(config.dispatch.tick(), Duration::from_millis(50));
    assert_eq!(config.dispatch.cpu_threads, 12);

    let settings = config.dispatch.settings().unwrap();
    assert_eq!(settings.join_timeout, Duration::from_millis(250));
    assert_eq!(settings.stall_timeout, Some(Duration::from_secs(600)));
    assert!(ConfigValidator::validate(&config).is_ok());
}

#[test]
#[serial]
fn test_partial_config_keeps_defaults() {
    clear_multimenu_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("multimenu.toml"),
        "[dispatch]\ntick_ms = 250\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();

    assert_eq!(config.dispatch.tick_ms, 250);
    assert_eq!(config.dispatch.join_timeout_ms, 1000);
    assert_eq!(config.tools.dir, PathBuf::from("Tools"));
    assert_eq!(
        config.inputs.allowed_extensions,
        vec!["kap", "jp2", "jpg", "tif", "iff"]
    );
    assert_eq!(config.dispatch.stall_timeout, None);
}

#[test]
#[serial]
fn test_env_stall_timeout_is_validated() {
    clear_multimenu_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("MULTIMENU_STALL_TIMEOUT", "eventually");

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    clear_multimenu_env();

    let err = ConfigValidator::validate(&config).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
}

#[test]
#[serial]
fn test_cli_flags_override_config_file() {
    clear_multimenu_env();
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.toml");
    fs::write(&config_path, "[tools]\ndir = \"from-file\"\n").unwrap();

    let args = Args::parse_from([
        "multimenu",
        "--config",
        config_path.to_str().unwrap(),
        "--tools-dir",
        "from-flag",
        "list",
    ]);
    let config = load_config(&args).unwrap();
    assert_eq!(config.tools.dir, PathBuf::from("from-flag"));

    let args = Args::parse_from(["multimenu", "list", "--config", config_path.to_str().unwrap()]);
    let config = load_config(&args).unwrap();
    assert_eq!(config.tools.dir, PathBuf::from("from-file"));
}

#[test]
#[serial]
fn test_zero_tick_is_rejected() {
    clear_multimenu_env();
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("multimenu.toml");
    fs::write(&config_path, "[dispatch]\ntick_ms = 0\n").unwrap();

    let args = Args::parse_from(["multimenu", "--config", config_path.to_str().unwrap(), "list"]);
    let err = load_config(&args).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
}
