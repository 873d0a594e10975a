use serde::{Deserialize, Serialize};

/// Token in a manifest command that expands to the running multimenu binary.
pub const SELF_TOKEN: &str = "{self}";

/// Plugin contract of one tool, read from `<tools dir>/<stem>.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolManifest {
    /// Program and arguments of one worker process.
    pub command: Vec<String>,

    /// Column header shown above the result rows.
    #[serde(default = "default_results_header")]
    pub results_header: String,

    /// Column header shown above the error rows.
    #[serde(default = "default_errors_header")]
    pub errors_header: String,

    /// Test tool: assign task labels `0..N` instead of discovered inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic_tasks: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocess: Option<PreprocessSpec>,
}

/// Preprocessing step run once before any worker starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreprocessSpec {
    /// Program and arguments; the input and output folders are appended.
    pub command: Vec<String>,

    /// humantime duration, e.g. "30s"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

fn default_results_header() -> String {
    "Results".to_string()
}

fn default_errors_header() -> String {
    "Errors".to_string()
}

impl ToolManifest {
    pub fn is_synthetic(&self) -> bool {
        self.synthetic_tasks.is_some()
    }
}
