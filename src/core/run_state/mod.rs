use crate::core::message::ResultMessage;
use crate::core::types::{MessageKind, ToolState};
use crate::core::worker::WorkerControl;
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Everything needed to register a freshly launched run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub tool: String,
    pub run_id: Uuid,
    pub assigned: Vec<String>,
    pub cpus: usize,
    pub log_only: bool,
    pub results_header: String,
    pub errors_header: String,
}

/// Outcome of recording one message against a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Counted { remaining: usize },
    Surplus,
}

struct WorkerSlot<W> {
    handle: W,
    exit: Option<Option<i32>>,
}

/// Per-tool run record held by the dispatcher registry.
pub struct ToolRun<W> {
    pub tool: String,
    pub run_id: Uuid,
    pub state: ToolState,
    pub assigned_tasks: Vec<String>,
    pub completed: usize,
    pub errors: usize,
    /// Tasks whose worker exited without reporting them.
    pub lost: usize,
    pub kill_requested: bool,
    pub cpus: usize,
    pub log_only: bool,
    pub results_header: String,
    pub errors_header: String,
    pub result_rows: Vec<String>,
    pub error_rows: Vec<String>,
    /// First status line ("Remaining tasks: N", "x completed.", ...).
    pub status: String,
    /// Second status line ("42% Complete", ...).
    pub detail: String,
    pub controls_enabled: bool,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub last_activity: Instant,
    workers: Vec<WorkerSlot<W>>,
}

impl<W: WorkerControl> ToolRun<W> {
    pub fn new(plan: RunPlan, workers: Vec<W>) -> Self {
        ToolRun {
            tool: plan.tool,
            run_id: plan.run_id,
            state: ToolState::Running,
            assigned_tasks: plan.assigned,
            completed: 0,
            errors: 0,
            lost: 0,
            kill_requested: false,
            cpus: plan.cpus,
            log_only: plan.log_only,
            results_header: plan.results_header,
            errors_header: plan.errors_header,
            result_rows: Vec::new(),
            error_rows: Vec::new(),
            status: "Initializing workers...".to_string(),
            detail: "All Tasks Assigned.".to_string(),
            controls_enabled: false,
            started_at: Local::now(),
            ended_at: None,
            last_activity: Instant::now(),
            workers: workers
                .into_iter()
                .map(|handle| WorkerSlot { handle, exit: None })
                .collect(),
        }
    }

    pub fn assigned(&self) -> usize {
        self.assigned_tasks.len()
    }

    /// Completed plus errored plus lost tasks.
    pub fn accounted(&self) -> usize {
        self.completed + self.errors + self.lost
    }

    pub fn remaining(&self) -> usize {
        self.assigned().saturating_sub(self.accounted())
    }

    pub fn progress_percent(&self) -> u16 {
        if self.assigned() == 0 {
            return 100;
        }
        let done = (self.completed + self.errors + self.lost) as f64;
        ((done / self.assigned() as f64) * 100.0).round().min(100.0) as u16
    }

    /// Count a message and append its display row.
    pub fn record(&mut self, message: &ResultMessage, now: Instant) -> RecordOutcome {
        if self.accounted() >= self.assigned() {
            return RecordOutcome::Surplus;
        }
        self.last_activity = now;
        match message.kind {
            MessageKind::Error => {
                self.errors += 1;
                self.error_rows.push(message.display_row(self.errors));
            }
            MessageKind::Result => {
                self.completed += 1;
                self.result_rows.push(message.display_row(self.completed));
            }
        }
        self.refresh_progress_lines();
        RecordOutcome::Counted {
            remaining: self.remaining(),
        }
    }

    fn refresh_progress_lines(&mut self) {
        let remaining = self.remaining();
        if remaining != 0 {
            self.status = format!("Remaining tasks: {}", remaining);
            self.detail = format!("{}% Complete", self.progress_percent());
        }
    }

    /// Mark every remaining task as lost.
    pub fn write_off_remaining(&mut self) -> usize {
        let remaining = self.remaining();
        self.lost += remaining;
        remaining
    }

    pub fn mark_exited(&mut self, index: usize, code: Option<i32>) -> bool {
        match self
            .workers
            .iter_mut()
            .find(|slot| slot.handle.id().index == index)
        {
            Some(slot) => {
                slot.exit = Some(code);
                true
            }
            None => false,
        }
    }

    pub fn all_workers_exited(&self) -> bool {
        self.workers.iter().all(|slot| slot.exit.is_some())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|slot| slot.exit.is_none()).count()
    }

    pub fn terminate_all(&mut self) {
        for slot in &mut self.workers {
            if slot.exit.is_none() {
                tracing::debug!(worker = %slot.handle.id(), "terminating worker");
                slot.handle.terminate();
            }
        }
    }

    /// Join every worker with `timeout` each; returns how many did not finish.
    pub fn join_all(&mut self, timeout: Duration) -> usize {
        let mut stragglers = 0;
        for slot in &mut self.workers {
            tracing::debug!(worker = %slot.handle.id(), "cleaning up worker");
            if !slot.handle.join(timeout) {
                stragglers += 1;
            }
        }
        stragglers
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.ended_at.unwrap_or_else(Local::now) - self.started_at
    }
}
