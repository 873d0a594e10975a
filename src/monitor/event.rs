use std::path::PathBuf;

/// Requests emitted by key handling that need the dispatcher or launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Launch the tool with the tab's current inputs.
    Start { tool: String },
    /// Flag the tool for termination on the next drain tick.
    Kill { tool: String },
    /// Clear a settled run and release its CPU selection.
    Reset { tool: String },
    /// Raise or lower the tool's CPU selection by `delta`.
    AdjustCpus { tool: String, delta: isize },
    /// Write the session log of a settled run into `dir`.
    WriteLog { tool: String, dir: PathBuf },
}

impl MenuAction {
    pub fn tool(&self) -> &str {
        match self {
            MenuAction::Start { tool }
            | MenuAction::Kill { tool }
            | MenuAction::Reset { tool }
            | MenuAction::AdjustCpus { tool, .. }
            | MenuAction::WriteLog { tool, .. } => tool,
        }
    }
}
