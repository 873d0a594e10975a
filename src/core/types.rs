use serde::{Deserialize, Serialize};

/// Lifecycle of a tool inside the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ToolState {
    #[default]
    Idle,
    Running,
    Completed,
    Killed,
}

impl ToolState {
    /// Whether the tool still owns live worker processes.
    pub fn is_active(self) -> bool {
        matches!(self, ToolState::Running)
    }

    /// Whether the run has settled and may be reset.
    pub fn is_settled(self) -> bool {
        matches!(self, ToolState::Completed | ToolState::Killed)
    }
}

impl std::fmt::Display for ToolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ToolState::Idle => "idle",
            ToolState::Running => "running",
            ToolState::Completed => "completed",
            ToolState::Killed => "killed",
        };
        f.write_str(label)
    }
}

/// Kind of message a worker reports for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Result,
    Error,
}

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    UserEntryError,
    PluginError,
    LaunchError,
    ConfigError,
    IoError,
    InternalError,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
    Debug,
}
