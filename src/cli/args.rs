use crate::tools::simulator::MessageFormat;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct TuiArgs {
    /// Only open tabs for these tools (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    pub tools: Vec<String>,

    /// Initial input folder for every tab
    #[arg(long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Initial output folder for every tab
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Folder session logs are written to (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tool to run; repeat to run several tools side by side
    #[arg(long = "tool", value_name = "NAME", required = true)]
    pub tools: Vec<String>,

    /// CPU threads (worker processes) given to each tool
    #[arg(long, default_value = "1")]
    pub cpus: usize,

    /// Folder holding the files to process
    #[arg(long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Folder tools write their output to
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Ask tools to log what they would do without writing output
    #[arg(long)]
    pub log_only: bool,

    /// Write a session log per tool into this folder once it settles
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Tool name prefixed to every message (default: $MULTIMENU_TOOL)
    #[arg(long, value_name = "NAME")]
    pub tool: Option<String>,

    /// Upper bound of the random per-item delay in milliseconds
    #[arg(long, default_value = "10000")]
    pub max_delay_ms: u64,

    /// Probability in [0, 1] that an item reports an error
    #[arg(long, default_value = "0.2")]
    pub error_rate: f64,

    /// Wire format of emitted messages
    #[arg(long, value_enum, default_value_t = MessageFormat::Legacy)]
    pub format: MessageFormat,
}
