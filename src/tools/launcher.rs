//! Spawns one worker process per partition and supervises it.
#![allow(clippy::result_large_err)]

use super::preprocess::run_preprocess;
use super::{ToolCatalog, ToolDescriptor};
use crate::core::dispatcher::Dispatcher;
use crate::core::error::AppError;
use crate::core::partition::partition;
use crate::core::run_state::RunPlan;
use crate::core::types::ErrorCategory;
use crate::core::worker::{WorkerControl, WorkerEvent, WorkerId};
use crate::utils::files::discover_inputs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use uuid::Uuid;

/// What the operator asked for when pressing Start.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    pub tool: String,
    pub cpus: usize,
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub log_only: bool,
}

/// Dispatcher-side handle of a spawned worker.
pub struct ProcessWorker {
    id: WorkerId,
    kill: Option<oneshot::Sender<()>>,
    done: std_mpsc::Receiver<()>,
    finished: bool,
}

impl WorkerControl for ProcessWorker {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    fn terminate(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }

    fn join(&mut self, timeout: Duration) -> bool {
        if self.finished {
            return true;
        }
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.finished = true;
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

pub struct Launcher {
    catalog: ToolCatalog,
    allowed_extensions: Vec<String>,
    self_exe: PathBuf,
    events: UnboundedSender<WorkerEvent>,
}

impl Launcher {
    pub fn new(
        catalog: ToolCatalog,
        allowed_extensions: Vec<String>,
        events: UnboundedSender<WorkerEvent>,
    ) -> Result<Self, AppError> {
        let self_exe = std::env::current_exe().map_err(|e| {
            AppError::new(
                ErrorCategory::LaunchError,
                format!("Cannot locate the multimenu binary: {}", e),
            )
        })?;
        Ok(Launcher {
            catalog,
            allowed_extensions,
            self_exe,
            events,
        })
    }

    /// Binary substituted for `{self}` in manifest commands.
    pub fn with_self_exe(mut self, self_exe: impl Into<PathBuf>) -> Self {
        self.self_exe = self_exe.into();
        self
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// User-entry checks that need no process to run.
    pub fn validate(&self, request: &LaunchRequest) -> Result<&ToolDescriptor, AppError> {
        let tool = self.catalog.get(&request.tool).ok_or_else(|| {
            AppError::user_entry(format!("Unknown tool: {}", request.tool)).with_code("TOOLS-002")
        })?;
        if tool.manifest.is_synthetic() {
            return Ok(tool);
        }

        let input = request
            .input_dir
            .as_deref()
            .ok_or_else(|| AppError::user_entry("Please select an input folder."))?;
        let output = request
            .output_dir
            .as_deref()
            .ok_or_else(|| AppError::user_entry("Please select an output folder."))?;
        if input == output {
            return Err(
                AppError::user_entry("Output folder cannot be same as input folder.")
                    .with_code("START-004"),
            );
        }
        for (label, dir) in [("Input", input), ("Output", output)] {
            if !dir.is_dir() {
                return Err(AppError::user_entry(format!(
                    "{} folder {} does not exist.",
                    label,
                    dir.display()
                )));
            }
        }
        Ok(tool)
    }

    /// Launch and register a run; returns its run identifier.
    pub async fn start(
        &self,
        dispatcher: &mut Dispatcher<ProcessWorker>,
        request: &LaunchRequest,
    ) -> Result<Uuid, AppError> {
        let (plan, workers) = self.launch(dispatcher, request).await?;
        let run_id = plan.run_id;
        dispatcher.begin(plan, workers)?;
        Ok(run_id)
    }

    /// Validate, admit, discover inputs, preprocess, partition and spawn.
    pub async fn launch(
        &self,
        dispatcher: &Dispatcher<ProcessWorker>,
        request: &LaunchRequest,
    ) -> Result<(RunPlan, Vec<ProcessWorker>), AppError> {
        let tool = self.validate(request)?;
        dispatcher.admit(&tool.name, request.cpus)?;

        let assigned: Vec<String> = match tool.manifest.synthetic_tasks {
            Some(count) => (0..count).map(|task| task.to_string()).collect(),
            None => {
                let input = request.input_dir.as_deref().unwrap_or_else(|| Path::new("."));
                discover_inputs(input, &self.allowed_extensions)?
                    .into_iter()
                    .map(|path| path.to_string_lossy().into_owned())
                    .collect()
            }
        };

        let artifact = match tool.preprocess_command_line(&self.self_exe) {
            Some(command) => {
                let (program, args) = command?;
                let timeout = tool
                    .manifest
                    .preprocess
                    .as_ref()
                    .and_then(|spec| spec.timeout.as_deref())
                    .map(humantime::parse_duration)
                    .transpose()
                    .map_err(|e| {
                        AppError::new(
                            ErrorCategory::PluginError,
                            format!("Tool {} has an invalid preprocess timeout: {}", tool.name, e),
                        )
                    })?;
                run_preprocess(
                    &tool.name,
                    &program,
                    &args,
                    request.input_dir.as_deref(),
                    request.output_dir.as_deref(),
                    timeout,
                )
                .await?
            }
            None => String::new(),
        };

        let partitions = partition(&assigned, request.cpus)?;
        let (program, args) = tool.command_line(&self.self_exe)?;
        let run_id = Uuid::new_v4();
        let env = WorkerEnv {
            output_dir: request
                .output_dir
                .as_deref()
                .map(|dir| dir.to_string_lossy().into_owned())
                .unwrap_or_default(),
            preprocess: artifact,
            log_only: request.log_only,
        };

        let mut workers = Vec::with_capacity(partitions.len());
        for (index, items) in partitions.into_iter().enumerate() {
            let id = WorkerId::new(&tool.name, run_id, index);
            workers.push(self.spawn_worker(id, &program, &args, items, &env)?);
        }

        tracing::info!(
            tool = %tool.name,
            run_id = %run_id,
            tasks = assigned.len(),
            workers = workers.len(),
            "all tasks assigned"
        );

        let plan = RunPlan {
            tool: tool.name.clone(),
            run_id,
            assigned,
            cpus: request.cpus,
            log_only: request.log_only,
            results_header: tool.manifest.results_header.clone(),
            errors_header: tool.manifest.errors_header.clone(),
        };
        Ok((plan, workers))
    }

    fn spawn_worker(
        &self,
        id: WorkerId,
        program: &Path,
        args: &[String],
        items: Vec<String>,
        env: &WorkerEnv,
    ) -> Result<ProcessWorker, AppError> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .env("MULTIMENU_TOOL", &id.tool)
            .env("MULTIMENU_WORKER_INDEX", id.index.to_string())
            .env("MULTIMENU_OUTPUT_DIR", &env.output_dir)
            .env("MULTIMENU_PREPROCESS", &env.preprocess)
            .env("MULTIMENU_LOG_ONLY", if env.log_only { "YES" } else { "NO" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::new(
                    ErrorCategory::LaunchError,
                    format!("Failed to spawn {} ({}): {}", id, program.display(), e),
                )
                .with_code("LAUNCH-001")
            })?;

        tracing::debug!(worker = %id, pid = ?child.id(), items = items.len(), "worker spawned");

        if let Some(mut stdin) = child.stdin.take() {
            let worker = id.clone();
            tokio::spawn(async move {
                let mut payload = items.join("\n");
                if !payload.is_empty() {
                    payload.push('\n');
                }
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    tracing::debug!(worker = %worker, "worker closed stdin early: {}", e);
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let worker = id.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                loop {
                    match read_lossy_line(&mut reader, &mut buf).await {
                        Ok(Some(line)) => tracing::debug!(worker = %worker, "{}", line),
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(worker = %worker, "worker stderr unreadable: {}", e);
                            break;
                        }
                    }
                }
            });
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            AppError::new(
                ErrorCategory::LaunchError,
                format!("stdout of {} was not captured", id),
            )
        })?;

        let (kill_tx, kill_rx) = oneshot::channel();
        let (done_tx, done_rx) = std_mpsc::channel();
        tokio::spawn(supervise(
            id.clone(),
            child,
            stdout,
            self.events.clone(),
            kill_rx,
            done_tx,
        ));

        Ok(ProcessWorker {
            id,
            kill: Some(kill_tx),
            done: done_rx,
            finished: false,
        })
    }
}

struct WorkerEnv {
    output_dir: String,
    preprocess: String,
    log_only: bool,
}

/// Forward stdout lines until EOF, then reap the process and report its exit.
/// The kill switch firing, or its sender being dropped, kills the process.
async fn supervise(
    id: WorkerId,
    mut child: Child,
    stdout: ChildStdout,
    events: UnboundedSender<WorkerEvent>,
    mut kill_rx: oneshot::Receiver<()>,
    done_tx: std_mpsc::Sender<()>,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut stdout_open = true;
    let mut kill_armed = true;

    let code = loop {
        tokio::select! {
            biased;
            _ = &mut kill_rx, if kill_armed => {
                kill_armed = false;
                tracing::debug!(worker = %id, "killing worker process");
                if let Err(e) = child.start_kill() {
                    tracing::debug!(worker = %id, "kill failed: {}", e);
                }
            }
            line = read_lossy_line(&mut reader, &mut buf), if stdout_open => match line {
                Ok(Some(line)) => {
                    let _ = events.send(WorkerEvent::Line { worker: id.clone(), line });
                }
                Ok(None) => stdout_open = false,
                Err(e) => {
                    tracing::warn!(worker = %id, "worker stdout unreadable: {}", e);
                    stdout_open = false;
                }
            },
            status = child.wait(), if !stdout_open => {
                break match status {
                    Ok(status) => status.code(),
                    Err(e) => {
                        tracing::warn!(worker = %id, "failed to reap worker: {}", e);
                        None
                    }
                };
            }
        }
    };

    let _ = events.send(WorkerEvent::Exited { worker: id, code });
    drop(done_tx);
}

/// Next newline-terminated line, decoded lossily; `None` at EOF.
///
/// Bytes of a line interrupted by `select!` stay in `buf` and are completed
/// by the next call, so the read is cancel safe.
async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let read = reader.read_until(b'\n', buf).await?;
    if read == 0 && buf.is_empty() {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(&['\r', '\n'][..])
        .to_string();
    buf.clear();
    Ok(Some(line))
}
