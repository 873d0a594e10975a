use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identity of one worker process: the tool it belongs to, the run that
/// spawned it and its partition index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId {
    pub tool: String,
    pub run_id: Uuid,
    pub index: usize,
}

impl WorkerId {
    pub fn new(tool: impl Into<String>, run_id: Uuid, index: usize) -> Self {
        WorkerId {
            tool: tool.into(),
            run_id,
            index,
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tool, self.index)
    }
}

/// Events flowing from worker supervisors into the results channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// One line printed by the worker on stdout.
    Line { worker: WorkerId, line: String },
    /// The worker's stdout closed and the process was reaped.
    Exited { worker: WorkerId, code: Option<i32> },
}

impl WorkerEvent {
    pub fn worker(&self) -> &WorkerId {
        match self {
            WorkerEvent::Line { worker, .. } | WorkerEvent::Exited { worker, .. } => worker,
        }
    }
}

/// Handle the dispatcher uses to stop or reap a worker.
pub trait WorkerControl {
    fn id(&self) -> &WorkerId;

    /// Forcefully stop the worker. No graceful signal is sent.
    fn terminate(&mut self);

    /// Wait up to `timeout` for the worker to finish; `true` if it did.
    fn join(&mut self, timeout: Duration) -> bool;
}
