//! Run registry, kill handler and the drain tick that turns worker output into
//! per-tool progress.
#![allow(clippy::result_large_err)]

use crate::core::cpu_budget::CpuBudget;
use crate::core::error::AppError;
use crate::core::message::{MessageParseError, ResultMessage};
use crate::core::run_state::{RecordOutcome, RunPlan, ToolRun};
use crate::core::types::ToolState;
use crate::core::worker::{WorkerControl, WorkerEvent};
use chrono::Local;
use indexmap::IndexMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

/// Timing knobs for cleanup and liveness.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub join_timeout: Duration,
    pub stall_timeout: Option<Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings {
            join_timeout: Duration::from_millis(1000),
            stall_timeout: None,
        }
    }
}

/// A state change observed during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub tool: String,
    pub state: ToolState,
}

/// Summary of one drain tick.
#[derive(Debug, Default, Clone)]
pub struct TickReport {
    /// Messages counted against a run.
    pub applied: usize,
    /// Lines that could not be attributed, were malformed, or exceeded the assignment.
    pub dropped: usize,
    pub transitions: Vec<Transition>,
}

pub struct Dispatcher<W: WorkerControl> {
    runs: IndexMap<String, ToolRun<W>>,
    budget: CpuBudget,
    completed_queue: Vec<String>,
    kill_queue: Vec<String>,
    settings: DispatchSettings,
}

impl<W: WorkerControl> Dispatcher<W> {
    pub fn new(total_cpus: usize, settings: DispatchSettings) -> Self {
        Dispatcher {
            runs: IndexMap::new(),
            budget: CpuBudget::new(total_cpus),
            completed_queue: Vec::new(),
            kill_queue: Vec::new(),
            settings,
        }
    }

    pub fn budget(&self) -> &CpuBudget {
        &self.budget
    }

    pub fn run(&self, tool: &str) -> Option<&ToolRun<W>> {
        self.runs.get(tool)
    }

    pub fn runs(&self) -> impl Iterator<Item = &ToolRun<W>> {
        self.runs.values()
    }

    pub fn state(&self, tool: &str) -> ToolState {
        self.runs
            .get(tool)
            .map(|run| run.state)
            .unwrap_or(ToolState::Idle)
    }

    pub fn is_running(&self, tool: &str) -> bool {
        self.state(tool).is_active()
    }

    pub fn any_running(&self) -> bool {
        self.runs.values().any(|run| run.state.is_active())
    }

    /// Change the CPU selection of an idle or settled tool.
    pub fn select_cpus(&mut self, tool: &str, cpus: usize) -> Result<(), AppError> {
        if self.is_running(tool) {
            return Err(AppError::user_entry(format!(
                "{} is running; its cpu allocation is frozen.",
                tool
            )));
        }
        self.budget.select(tool, cpus)
    }

    /// Check a start request before any process is spawned.
    pub fn admit(&self, tool: &str, cpus: usize) -> Result<(), AppError> {
        match self.state(tool) {
            ToolState::Running => {
                return Err(AppError::user_entry(format!("{} is already running.", tool))
                    .with_code("START-002"));
            }
            ToolState::Completed | ToolState::Killed => {
                return Err(AppError::user_entry(format!(
                    "{} must be reset before it can start again.",
                    tool
                ))
                .with_code("START-005"));
            }
            ToolState::Idle => {}
        }
        if cpus == 0 {
            return Err(
                AppError::user_entry("User must allocate at least one cpu thread.")
                    .with_code("START-001"),
            );
        }
        let ceiling = self.budget.max_selection(tool);
        if cpus > ceiling {
            return Err(AppError::user_entry(format!(
                "Number of CPUs available for tasking: [{}]; requested {}.",
                ceiling, cpus
            ))
            .with_code("START-003"));
        }
        Ok(())
    }

    /// Register a launched run; the tool becomes Running.
    pub fn begin(&mut self, plan: RunPlan, workers: Vec<W>) -> Result<(), AppError> {
        self.admit(&plan.tool, plan.cpus)?;
        self.budget.select(&plan.tool, plan.cpus)?;
        self.forget_queued(&plan.tool);

        let tool = plan.tool.clone();
        tracing::info!(
            tool = %tool,
            run_id = %plan.run_id,
            assigned = plan.assigned.len(),
            workers = workers.len(),
            "run started"
        );
        let run = ToolRun::new(plan, workers);
        let empty = run.assigned() == 0;
        self.runs.insert(tool.clone(), run);
        if empty {
            self.completed_queue.push(tool);
        }
        Ok(())
    }

    /// Flag a running tool for forceful termination on the next tick.
    pub fn kill(&mut self, tool: &str) -> Result<(), AppError> {
        let run = self
            .runs
            .get_mut(tool)
            .filter(|run| run.state.is_active())
            .ok_or_else(|| AppError::user_entry(format!("{} is not running.", tool)))?;
        if run.kill_requested {
            return Ok(());
        }
        run.kill_requested = true;
        run.status = format!("Killing {}", tool);
        self.kill_queue.push(tool.to_string());
        tracing::info!(tool = %tool, "kill requested");
        Ok(())
    }

    /// Clear a settled run and release its CPU selection.
    pub fn reset(&mut self, tool: &str) -> Result<(), AppError> {
        if self.is_running(tool) {
            return Err(AppError::user_entry(format!(
                "{} is running; kill it before resetting.",
                tool
            )));
        }
        self.runs.shift_remove(tool);
        self.forget_queued(tool);
        self.budget.release(tool);
        Ok(())
    }

    /// Terminate every running tool immediately; used when the shell exits.
    pub fn shutdown(&mut self) {
        for run in self.runs.values_mut().filter(|run| run.state.is_active()) {
            tracing::info!(tool = %run.tool, "terminating on shutdown");
            run.terminate_all();
            run.state = ToolState::Killed;
            run.ended_at = Some(Local::now());
        }
        self.kill_queue.clear();
        self.completed_queue.clear();
    }

    pub fn tick(&mut self, events: &mut UnboundedReceiver<WorkerEvent>) -> TickReport {
        self.tick_at(events, Instant::now())
    }

    /// One drain tick: cleanup queued kills and completions, drain the
    /// channel, then check liveness.
    pub fn tick_at(
        &mut self,
        events: &mut UnboundedReceiver<WorkerEvent>,
        now: Instant,
    ) -> TickReport {
        let mut report = TickReport::default();

        self.cleanup_killed(&mut report);
        self.cleanup_completed(&mut report);

        while let Ok(event) = events.try_recv() {
            self.apply(event, now, &mut report);
        }

        self.check_liveness(now);
        report
    }

    /// Apply a single channel event.
    pub fn apply(&mut self, event: WorkerEvent, now: Instant, report: &mut TickReport) {
        let Some(run) = self.runs.get_mut(&event.worker().tool) else {
            tracing::debug!(worker = %event.worker(), "event for unknown tool dropped");
            report.dropped += 1;
            return;
        };
        if run.run_id != event.worker().run_id {
            tracing::debug!(worker = %event.worker(), "event from a previous run dropped");
            report.dropped += 1;
            return;
        }

        match event {
            WorkerEvent::Line { worker, line } => {
                if !run.state.is_active() {
                    tracing::debug!(worker = %worker, "late message after cleanup dropped");
                    report.dropped += 1;
                    return;
                }
                let message = match ResultMessage::parse_line(&run.tool, &line) {
                    Ok(message) => message,
                    Err(MessageParseError::Empty) => return,
                    Err(err) => {
                        tracing::warn!(worker = %worker, line = %line, "dropping worker line: {}", err);
                        report.dropped += 1;
                        return;
                    }
                };
                match run.record(&message, now) {
                    RecordOutcome::Counted { remaining } => {
                        report.applied += 1;
                        if remaining == 0
                            && !run.kill_requested
                            && !self.completed_queue.contains(&run.tool)
                        {
                            self.completed_queue.push(run.tool.clone());
                        }
                    }
                    RecordOutcome::Surplus => {
                        tracing::warn!(
                            worker = %worker,
                            assigned = run.assigned(),
                            "message beyond assignment dropped"
                        );
                        report.dropped += 1;
                    }
                }
            }
            WorkerEvent::Exited { worker, code } => {
                run.mark_exited(worker.index, code);
                if code != Some(0) && !run.kill_requested {
                    tracing::warn!(worker = %worker, code = ?code, "worker exited abnormally");
                } else {
                    tracing::debug!(worker = %worker, code = ?code, "worker exited");
                }
            }
        }
    }

    fn cleanup_killed(&mut self, report: &mut TickReport) {
        for tool in std::mem::take(&mut self.kill_queue) {
            let Some(run) = self.runs.get_mut(&tool) else {
                continue;
            };
            if !run.state.is_active() {
                continue;
            }
            run.terminate_all();
            run.state = ToolState::Killed;
            run.status = format!("{} ended by analyst...", tool);
            run.controls_enabled = true;
            run.ended_at = Some(Local::now());
            tracing::info!(tool = %tool, completed = run.completed, errors = run.errors, "run killed");
            report.transitions.push(Transition {
                tool,
                state: ToolState::Killed,
            });
        }
    }

    fn cleanup_completed(&mut self, report: &mut TickReport) {
        let join_timeout = self.settings.join_timeout;
        for tool in std::mem::take(&mut self.completed_queue) {
            let Some(run) = self.runs.get_mut(&tool) else {
                continue;
            };
            if !run.state.is_active() || run.kill_requested {
                continue;
            }
            let stragglers = run.join_all(join_timeout);
            if stragglers > 0 {
                tracing::warn!(tool = %tool, stragglers, "workers still alive after join timeout");
            }
            run.state = ToolState::Completed;
            run.status = format!("{} completed.", tool);
            run.detail = "100% Complete".to_string();
            run.controls_enabled = true;
            run.ended_at = Some(Local::now());
            tracing::info!(
                tool = %tool,
                completed = run.completed,
                errors = run.errors,
                lost = run.lost,
                "run completed"
            );
            report.transitions.push(Transition {
                tool,
                state: ToolState::Completed,
            });
        }
    }

    fn check_liveness(&mut self, now: Instant) {
        let stall_timeout = self.settings.stall_timeout;
        for run in self.runs.values_mut() {
            if !run.state.is_active()
                || run.kill_requested
                || self.completed_queue.contains(&run.tool)
            {
                continue;
            }

            if run.all_workers_exited() && run.remaining() > 0 {
                let lost = run.write_off_remaining();
                tracing::warn!(tool = %run.tool, lost, "all workers exited with tasks unreported");
                run.status = format!("{} task(s) lost: workers exited early", lost);
                self.completed_queue.push(run.tool.clone());
                continue;
            }

            if let Some(limit) = stall_timeout {
                if now.saturating_duration_since(run.last_activity) > limit {
                    tracing::warn!(tool = %run.tool, ?limit, "no worker output within stall timeout");
                    run.kill_requested = true;
                    run.status = format!("{} stalled; killing", run.tool);
                    self.kill_queue.push(run.tool.clone());
                }
            }
        }
    }

    fn forget_queued(&mut self, tool: &str) {
        self.completed_queue.retain(|queued| queued != tool);
        self.kill_queue.retain(|queued| queued != tool);
    }
}
