#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Case-insensitive suffix match of the file name against `allowed`.
pub fn has_allowed_extension(path: &Path, allowed: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    allowed
        .iter()
        .any(|ext| !ext.is_empty() && name.ends_with(&ext.to_ascii_lowercase()))
}

/// Walk `input_dir` recursively and return every accepted file, sorted.
pub fn discover_inputs(input_dir: &Path, allowed: &[String]) -> Result<Vec<PathBuf>, AppError> {
    if !input_dir.is_dir() {
        return Err(AppError::user_entry(format!(
            "Input folder {} does not exist.",
            input_dir.display()
        ))
        .with_code("INPUT-001"));
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(input_dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable input entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if has_allowed_extension(entry.path(), allowed) {
            tracing::trace!(path = %entry.path().display(), "found input");
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}
