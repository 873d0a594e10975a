//! Tool plugins: manifest discovery, worker launch and the built-in simulator.
#![allow(clippy::result_large_err)]

pub mod launcher;
pub mod manifest;
pub mod preprocess;
pub mod simulator;

pub use launcher::{LaunchRequest, Launcher, ProcessWorker};
pub use manifest::{PreprocessSpec, ToolManifest, SELF_TOKEN};

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One discovered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Display name: file stem with leading digits removed.
    pub name: String,
    /// Raw file stem, used for ordering.
    pub stem: String,
    pub path: PathBuf,
    pub manifest: ToolManifest,
}

impl ToolDescriptor {
    fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Worker program and arguments with `{self}` expanded.
    pub fn command_line(&self, self_exe: &Path) -> Result<(PathBuf, Vec<String>), AppError> {
        resolve_command(&self.name, &self.manifest.command, self_exe, self.base_dir())
    }

    pub fn preprocess_command_line(
        &self,
        self_exe: &Path,
    ) -> Option<Result<(PathBuf, Vec<String>), AppError>> {
        self.manifest
            .preprocess
            .as_ref()
            .map(|spec| resolve_command(&self.name, &spec.command, self_exe, self.base_dir()))
    }
}

/// Expand `{self}` and resolve relative programs that contain a path
/// separator against `base_dir`.
pub fn resolve_command(
    tool: &str,
    command: &[String],
    self_exe: &Path,
    base_dir: &Path,
) -> Result<(PathBuf, Vec<String>), AppError> {
    let (program, args) = command.split_first().ok_or_else(|| {
        AppError::new(
            ErrorCategory::PluginError,
            format!("Tool {} declares an empty command", tool),
        )
        .with_code("PLUGIN-001")
    })?;

    let self_text = self_exe.to_string_lossy();
    let program = if program == SELF_TOKEN {
        self_exe.to_path_buf()
    } else {
        let candidate = PathBuf::from(program);
        if candidate.is_relative() && program.contains(&['/', '\\'][..]) {
            base_dir.join(candidate)
        } else {
            candidate
        }
    };
    let args = args
        .iter()
        .map(|arg| arg.replace(SELF_TOKEN, &self_text))
        .collect();
    Ok((program, args))
}

/// Tools discovered from the tools directory, ordered by raw file stem.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Read every `*.toml` manifest in `dir`. Manifests that fail to parse are
    /// skipped with a warning.
    pub fn discover(dir: &Path) -> Result<Self, AppError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Cannot read tools directory {}: {}", dir.display(), e),
            )
            .with_code("TOOLS-001")
            .with_suggestion("Set [tools] dir in multimenu.toml or pass --tools-dir")
        })?;

        let leading_digits = Regex::new(r"^\d*").map_err(|e| anyhow::anyhow!(e))?;
        let mut tools = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let name = leading_digits.replace(&stem, "").into_owned();
            if name.is_empty() {
                tracing::warn!(path = %path.display(), "tool manifest has no name after its digits, skipped");
                continue;
            }

            let manifest = match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| toml::from_str::<ToolManifest>(&content).map_err(|e| e.to_string()))
            {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping tool manifest: {}", e);
                    continue;
                }
            };

            tools.push(ToolDescriptor {
                name,
                stem,
                path,
                manifest,
            });
        }

        tools.sort_by(|a, b| a.stem.cmp(&b.stem));
        let mut seen = HashSet::new();
        tools.retain(|tool| {
            let first = seen.insert(tool.name.clone());
            if !first {
                tracing::warn!(tool = %tool.name, path = %tool.path.display(), "duplicate tool name, skipped");
            }
            first
        });
        tracing::debug!(dir = %dir.display(), count = tools.len(), "tools discovered");
        Ok(ToolCatalog { tools })
    }

    pub fn from_tools(tools: Vec<ToolDescriptor>) -> Self {
        ToolCatalog { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Keep only the named tools, in catalog order.
    pub fn restrict_to(&self, names: &[String]) -> Result<Self, AppError> {
        if let Some(unknown) = names.iter().find(|name| self.get(name).is_none()) {
            return Err(AppError::user_entry(format!("Unknown tool: {}", unknown))
                .with_code("TOOLS-002"));
        }
        Ok(ToolCatalog {
            tools: self
                .tools
                .iter()
                .filter(|tool| names.contains(&tool.name))
                .cloned()
                .collect(),
        })
    }
}
