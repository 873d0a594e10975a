//! Plain-text session log written on demand for a settled run.
#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::run_state::ToolRun;
use crate::core::worker::WorkerControl;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const NOTHING_TO_LOG: &str = "There is nothing to log.";

/// `Tue Mar  5 14:03:09 2024`
pub fn ctime(at: &DateTime<Local>) -> String {
    at.format("%a %b %e %H:%M:%S %Y").to_string()
}

/// `<tab>_<ctime with spaces as '_' and colons as '-'>.txt`
pub fn session_log_name(tab: &str, at: &DateTime<Local>) -> String {
    format!("{}_{}.txt", tab, ctime(at).replace(' ', "_").replace(':', "-"))
}

pub fn render_session_log<W: WorkerControl>(tab: &str, run: &ToolRun<W>) -> String {
    let started = ctime(&run.started_at);
    let ended = run
        .ended_at
        .as_ref()
        .map(ctime)
        .unwrap_or_else(|| ctime(&Local::now()));

    let mut out = String::new();
    let _ = writeln!(out, "{} time started: {}\n", tab, started);
    let _ = writeln!(out, "{} time ended: {}\n", tab, ended);

    out.push_str("Results:\n");
    push_section(&mut out, &run.results_header, &run.result_rows);

    out.push_str("\nErrors:\n");
    push_section(&mut out, &run.errors_header, &run.error_rows);
    out
}

fn push_section(out: &mut String, header: &str, rows: &[String]) {
    out.push_str(header);
    out.push('\n');
    if rows.is_empty() {
        out.push_str(NOTHING_TO_LOG);
        out.push('\n');
    }
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
}

/// Write the log of a settled run into `dir`, returning the file path.
pub fn write_session_log<W: WorkerControl>(
    dir: &Path,
    tab: &str,
    run: &ToolRun<W>,
) -> Result<PathBuf, AppError> {
    if !run.state.is_settled() {
        return Err(AppError::user_entry(format!(
            "{} has not finished; nothing to log yet.",
            tab
        )));
    }
    if !dir.is_dir() {
        return Err(AppError::user_entry(format!(
            "Log folder {} does not exist.",
            dir.display()
        ))
        .with_code("LOG-001"));
    }

    let path = dir.join(session_log_name(tab, &Local::now()));
    std::fs::write(&path, render_session_log(tab, run))?;
    tracing::info!(tool = %tab, path = %path.display(), "session log written");
    Ok(path)
}
