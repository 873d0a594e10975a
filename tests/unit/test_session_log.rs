use chrono::{Local, TimeZone};
use multimenu::core::session_log::{
    render_session_log, session_log_name, write_session_log, NOTHING_TO_LOG,
};
use multimenu::core::{ResultMessage, RunPlan, ToolRun, ToolState, WorkerControl, WorkerId};
use std::fs;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use uuid::Uuid;

struct IdleWorker(WorkerId);

impl WorkerControl for IdleWorker {
    fn id(&self) -> &WorkerId {
        &self.0
    }

    fn terminate(&mut self) {}

    fn join(&mut self, _timeout: Duration) -> bool {
        true
    }
}

fn finished_run(results: &[&str], errors: &[&str]) -> ToolRun<IdleWorker> {
    let run_id = Uuid::new_v4();
    let plan = RunPlan {
        tool: "taskOneFix".to_string(),
        run_id,
        assigned: (0..results.len() + errors.len()).map(|t| t.to_string()).collect(),
        cpus: 1,
        log_only: false,
        results_header: "Random Task Number | Random Decimal One".to_string(),
        errors_header: "Random Task Number | Error Message".to_string(),
    };
    let mut run = ToolRun::new(plan, vec![IdleWorker(WorkerId::new("taskOneFix", run_id, 0))]);
    for fields in results {
        let message = ResultMessage::result("taskOneFix", fields.split('\t').map(String::from).collect());
        run.record(&message, Instant::now());
    }
    for fields in errors {
        let message = ResultMessage::error("taskOneFix", vec![fields.to_string()]);
        run.record(&message, Instant::now());
    }
    run.state = ToolState::Completed;
    run.started_at = Local.with_ymd_and_hms(2024, 3, 5, 14, 3, 9).unwrap();
    run.ended_at = Some(Local.with_ymd_and_hms(2024, 3, 5, 14, 5, 0).unwrap());
    run
}

#[test]
fn log_lists_rows_under_their_headers() {
    let run = finished_run(&["randTask-4\t2.500"], &["randTask-9 experienced an error."]);
    let text = render_session_log("taskOneFix", &run);

    let expected = "\
taskOneFix time started: Tue Mar  5 14:03:09 2024

taskOneFix time ended: Tue Mar  5 14:05:00 2024

Results:
Random Task Number | Random Decimal One
1: randTask-4 | 2.500

Errors:
Random Task Number | Error Message
1: randTask-9 experienced an error.
";
    assert_eq!(text, expected);
}

#[test]
fn empty_sections_say_nothing_to_log() {
    let run = finished_run(&["randTask-1\t1.000"], &[]);
    let text = render_session_log("taskOneFix", &run);
    let errors = text.split("Errors:\n").nth(1).unwrap();
    assert_eq!(errors, format!("Random Task Number | Error Message\n{}\n", NOTHING_TO_LOG));
}

#[test]
fn file_name_encodes_tab_and_time() {
    let at = Local.with_ymd_and_hms(2024, 11, 21, 9, 7, 5).unwrap();
    assert_eq!(
        session_log_name("taskThreeFix", &at),
        "taskThreeFix_Thu_Nov_21_09-07-05_2024.txt"
    );
}

#[test]
fn writes_log_into_existing_folder() {
    let dir = TempDir::new().unwrap();
    let run = finished_run(&["randTask-1\t1.000"], &[]);

    let path = write_session_log(dir.path(), "taskOneFix", &run).unwrap();

    assert_eq!(path.parent().unwrap(), dir.path());
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("taskOneFix_"));
    assert!(name.ends_with(".txt"));
    assert!(fs::read_to_string(&path).unwrap().contains("1: randTask-1 | 1.000"));
}

#[test]
fn refuses_running_runs_and_missing_folders() {
    let dir = TempDir::new().unwrap();
    let mut run = finished_run(&["randTask-1\t1.000"], &[]);

    let missing = dir.path().join("nope");
    let err = write_session_log(&missing, "taskOneFix", &run).unwrap_err();
    assert_eq!(err.code, "LOG-001");

    run.state = ToolState::Running;
    let err = write_session_log(dir.path(), "taskOneFix", &run).unwrap_err();
    assert!(err.is_user_entry());
}
