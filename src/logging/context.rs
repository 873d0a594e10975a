use crate::cli::Command;

/// Execution contexts that influence how logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Interactive terminal UI (`multimenu tui`); the console belongs to the UI.
    Tui,
    /// A worker process (`multimenu simulate`); stdout is the results channel.
    Worker,
    /// Headless runs and catalog listing driven from a shell.
    LocalDev,
}

impl ExecutionContext {
    /// Returns `true` when console sinks should be disabled.
    pub fn disables_console(self) -> bool {
        matches!(self, ExecutionContext::Tui | ExecutionContext::Worker)
    }
}

/// Derive the active execution context from a parsed CLI command.
pub fn detect_context(command: &Command) -> ExecutionContext {
    match command {
        Command::Tui(_) => ExecutionContext::Tui,
        Command::Simulate(_) => ExecutionContext::Worker,
        Command::Run(_) | Command::List => ExecutionContext::LocalDev,
    }
}
