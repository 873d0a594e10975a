use crate::core::dispatcher::DispatchSettings;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration loaded from multimenu.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MultiMenuConfig {
    /// Tool catalog configuration
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Input discovery configuration
    #[serde(default)]
    pub inputs: InputsConfig,

    /// Drain loop and worker lifecycle configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// Directory holding one manifest per tool
    #[serde(default = "default_tools_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputsConfig {
    /// File name suffixes accepted as inputs, matched case-insensitively
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// Drain tick interval in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Per-worker join timeout during completion cleanup
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// Size of the shared CPU-thread pool
    #[serde(default = "default_cpu_threads")]
    pub cpu_threads: usize,

    /// Kill a running tool after this long without output (e.g. "10m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stall_timeout: Option<String>,
}

impl DispatchConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Timing knobs handed to the dispatcher.
    #[allow(clippy::result_large_err)]
    pub fn settings(&self) -> Result<DispatchSettings, AppError> {
        let stall_timeout = self.stall_timeout().map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("dispatch.stall_timeout is not a duration: {}", e),
            )
        })?;
        Ok(DispatchSettings {
            join_timeout: self.join_timeout(),
            stall_timeout,
        })
    }

    /// Parsed stall timeout; `None` when unset.
    pub fn stall_timeout(&self) -> Result<Option<Duration>, humantime::DurationError> {
        self.stall_timeout
            .as_deref()
            .map(humantime::parse_duration)
            .transpose()
    }
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from("Tools")
}

fn default_allowed_extensions() -> Vec<String> {
    ["kap", "jp2", "jpg", "tif", "iff"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_tick_ms() -> u64 {
    100
}

fn default_join_timeout_ms() -> u64 {
    1000
}

fn default_cpu_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            dir: default_tools_dir(),
        }
    }
}

impl Default for InputsConfig {
    fn default() -> Self {
        InputsConfig {
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            tick_ms: default_tick_ms(),
            join_timeout_ms: default_join_timeout_ms(),
            cpu_threads: default_cpu_threads(),
            stall_timeout: None,
        }
    }
}


pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;
