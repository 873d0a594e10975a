use multimenu::core::{
    DispatchSettings, Dispatcher, RunPlan, ToolState, WorkerControl, WorkerEvent, WorkerId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::unbounded_channel;
use uuid::Uuid;

/// Worker stand-in that counts terminate calls.
struct CountingWorker {
    id: WorkerId,
    terminated: Arc<AtomicUsize>,
}

impl WorkerControl for CountingWorker {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    fn terminate(&mut self) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }

    fn join(&mut self, _timeout: Duration) -> bool {
        true
    }
}

fn begin(
    dispatcher: &mut Dispatcher<CountingWorker>,
    tool: &str,
    tasks: usize,
    cpus: usize,
) -> (Uuid, Arc<AtomicUsize>) {
    let run_id = Uuid::new_v4();
    let terminated = Arc::new(AtomicUsize::new(0));
    let workers = (0..cpus)
        .map(|index| CountingWorker {
            id: WorkerId::new(tool, run_id, index),
            terminated: terminated.clone(),
        })
        .collect();
    let plan = RunPlan {
        tool: tool.to_string(),
        run_id,
        assigned: (0..tasks).map(|task| task.to_string()).collect(),
        cpus,
        log_only: false,
        results_header: "Random Task Number | Value".to_string(),
        errors_header: "Random Task Number | Error Message".to_string(),
    };
    dispatcher.begin(plan, workers).unwrap();
    (run_id, terminated)
}

fn result_line(tool: &str, run_id: Uuid, index: usize, task: usize) -> WorkerEvent {
    WorkerEvent::Line {
        worker: WorkerId::new(tool, run_id, index),
        line: format!("{}randTask-{}\t1.250", tool, task),
    }
}

#[test]
fn budget_is_shared_between_tools_until_reset() {
    let mut dispatcher = Dispatcher::new(4, DispatchSettings::default());
    let (run_id, _) = begin(&mut dispatcher, "taskOneFix", 1, 3);
    assert_eq!(dispatcher.budget().available(), 1);

    let err = dispatcher.admit("taskThreeFix", 2).unwrap_err();
    assert_eq!(err.code, "START-003");
    assert!(err.is_user_entry());

    let (tx, mut rx) = unbounded_channel();
    tx.send(result_line("taskOneFix", run_id, 0, 1)).unwrap();
    dispatcher.tick(&mut rx);
    dispatcher.tick(&mut rx);
    assert_eq!(dispatcher.state("taskOneFix"), ToolState::Completed);

    // Settled runs keep their selection until reset.
    assert!(dispatcher.admit("taskThreeFix", 2).is_err());
    dispatcher.reset("taskOneFix").unwrap();
    assert_eq!(dispatcher.state("taskOneFix"), ToolState::Idle);
    assert_eq!(dispatcher.budget().available(), 4);
    assert!(dispatcher.admit("taskThreeFix", 2).is_ok());
}

#[test]
fn workers_exiting_early_write_off_remaining_tasks() {
    let mut dispatcher = Dispatcher::new(4, DispatchSettings::default());
    let (run_id, _) = begin(&mut dispatcher, "taskOneFix", 5, 2);
    let (tx, mut rx) = unbounded_channel();
    tx.send(result_line("taskOneFix", run_id, 0, 7)).unwrap();
    for index in 0..2 {
        tx.send(WorkerEvent::Exited {
            worker: WorkerId::new("taskOneFix", run_id, index),
            code: Some(1),
        })
        .unwrap();
    }

    dispatcher.tick(&mut rx);
    {
        let run = dispatcher.run("taskOneFix").unwrap();
        assert_eq!(run.lost, 4);
        assert_eq!(run.live_workers(), 0);
    }

    dispatcher.tick(&mut rx);
    let run = dispatcher.run("taskOneFix").unwrap();
    assert_eq!(run.state, ToolState::Completed);
    assert_eq!(run.completed, 1);
    assert_eq!(run.accounted(), 5);
}

#[test]
fn silent_tool_is_killed_after_stall_timeout() {
    let settings = DispatchSettings {
        join_timeout: Duration::from_millis(10),
        stall_timeout: Some(Duration::from_secs(60)),
    };
    let mut dispatcher = Dispatcher::new(2, settings);
    let (_, terminated) = begin(&mut dispatcher, "taskOneFix", 10, 2);
    let (_tx, mut rx) = unbounded_channel();

    let now = Instant::now();
    dispatcher.tick_at(&mut rx, now + Duration::from_secs(30));
    assert_eq!(dispatcher.state("taskOneFix"), ToolState::Running);

    dispatcher.tick_at(&mut rx, now + Duration::from_secs(61));
    let report = dispatcher.tick_at(&mut rx, now + Duration::from_secs(62));
    assert_eq!(dispatcher.state("taskOneFix"), ToolState::Killed);
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(terminated.load(Ordering::SeqCst), 2);
}

#[test]
fn shutdown_terminates_every_running_tool() {
    let mut dispatcher = Dispatcher::new(4, DispatchSettings::default());
    let (_, one) = begin(&mut dispatcher, "taskOneFix", 10, 2);
    let (_, three) = begin(&mut dispatcher, "taskThreeFix", 10, 2);
    assert!(dispatcher.any_running());

    dispatcher.shutdown();

    assert!(!dispatcher.any_running());
    assert_eq!(one.load(Ordering::SeqCst), 2);
    assert_eq!(three.load(Ordering::SeqCst), 2);
    assert_eq!(dispatcher.state("taskThreeFix"), ToolState::Killed);
}

#[test]
fn lines_from_other_tools_are_not_counted() {
    let mut dispatcher = Dispatcher::new(4, DispatchSettings::default());
    let (run_id, _) = begin(&mut dispatcher, "taskOneFix", 3, 1);
    let (tx, mut rx) = unbounded_channel();
    tx.send(WorkerEvent::Line {
        worker: WorkerId::new("taskOneFix", run_id, 0),
        line: "some unrelated chatter".to_string(),
    })
    .unwrap();
    tx.send(result_line("taskOneFix", run_id, 0, 2)).unwrap();

    let report = dispatcher.tick(&mut rx);
    assert_eq!(report.applied, 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(dispatcher.run("taskOneFix").unwrap().remaining(), 2);
}

#[test]
fn status_lines_follow_progress() {
    let mut dispatcher = Dispatcher::new(2, DispatchSettings::default());
    let (run_id, _) = begin(&mut dispatcher, "taskOneFix", 4, 2);
    let run = dispatcher.run("taskOneFix").unwrap();
    assert_eq!(run.status, "Initializing workers...");
    assert_eq!(run.detail, "All Tasks Assigned.");

    let (tx, mut rx) = unbounded_channel();
    tx.send(result_line("taskOneFix", run_id, 0, 0)).unwrap();
    dispatcher.tick(&mut rx);
    let run = dispatcher.run("taskOneFix").unwrap();
    assert_eq!(run.status, "Remaining tasks: 3");
    assert_eq!(run.detail, "25% Complete");
}
