#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

/// Run a tool's preprocessing command once, before any worker starts.
///
/// The input and output folders are appended to the arguments; the trimmed
/// stdout becomes the artifact handed to every worker.
pub async fn run_preprocess(
    tool: &str,
    program: &Path,
    args: &[String],
    input_dir: Option<&Path>,
    output_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<String, AppError> {
    let folder_args: Vec<PathBuf> = [input_dir, output_dir]
        .into_iter()
        .flatten()
        .map(Path::to_path_buf)
        .collect();

    tracing::info!(tool = %tool, program = %program.display(), "running preprocessing");
    let mut command = tokio::process::Command::new(program);
    command
        .args(args)
        .args(&folder_args)
        .env("MULTIMENU_TOOL", tool)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| {
                AppError::new(
                    ErrorCategory::PluginError,
                    format!("Preprocessing for {} timed out after {:?}", tool, limit),
                )
                .with_code("PREPROCESS-002")
            })?,
        None => command.output().await,
    }
    .map_err(|e| {
        AppError::new(
            ErrorCategory::LaunchError,
            format!("Failed to start preprocessing for {}: {}", tool, e),
        )
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut error = AppError::new(
            ErrorCategory::PluginError,
            format!("Preprocessing for {} failed with {}", tool, output.status),
        )
        .with_code("PREPROCESS-001");
        error.add_context("stderr", stderr.trim());
        return Err(error);
    }

    let artifact = String::from_utf8_lossy(&output.stdout).trim().to_string();
    tracing::debug!(tool = %tool, bytes = artifact.len(), "preprocessing finished");
    Ok(artifact)
}
