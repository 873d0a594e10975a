#![allow(clippy::result_large_err)]

use super::MultiMenuConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "multimenu.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from the workspace root (workspace/multimenu.toml).
    /// Environment variables override config file values; a missing file
    /// falls back to defaults.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<MultiMenuConfig, AppError> {
        Self::load(&workspace_path.join(CONFIG_FILE_NAME))
    }

    /// Load an explicit config file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<MultiMenuConfig, AppError> {
        let mut config = Self::load_from_file(path)?.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Returns Ok(None) if the file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<MultiMenuConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: MultiMenuConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("CONFIG-001")
        })?;

        Ok(Some(config))
    }

    /// Environment variables take precedence over config file values.
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(config: &mut MultiMenuConfig) {
        if let Ok(dir) = env::var("MULTIMENU_TOOLS_DIR") {
            config.tools.dir = PathBuf::from(dir);
        }

        if let Ok(extensions) = env::var("MULTIMENU_ALLOWED_EXTENSIONS") {
            config.inputs.allowed_extensions = extensions
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(tick_ms) = env::var("MULTIMENU_TICK_MS") {
            if let Ok(tick_ms) = tick_ms.parse::<u64>() {
                config.dispatch.tick_ms = tick_ms;
            }
        }

        if let Ok(join_timeout_ms) = env::var("MULTIMENU_JOIN_TIMEOUT_MS") {
            if let Ok(join_timeout_ms) = join_timeout_ms.parse::<u64>() {
                config.dispatch.join_timeout_ms = join_timeout_ms;
            }
        }

        if let Ok(cpu_threads) = env::var("MULTIMENU_CPU_THREADS") {
            if let Ok(cpu_threads) = cpu_threads.parse::<usize>() {
                config.dispatch.cpu_threads = cpu_threads;
            }
        }

        if let Ok(stall_timeout) = env::var("MULTIMENU_STALL_TIMEOUT") {
            config.dispatch.stall_timeout = Some(stall_timeout);
        }
    }
}
