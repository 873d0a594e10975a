pub mod config;
pub mod cpu_budget;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod partition;
pub mod run_state;
pub mod session_log;
pub mod types;
pub mod worker;

pub use config::{ConfigLoader, ConfigValidator, MultiMenuConfig};
pub use cpu_budget::CpuBudget;
pub use dispatcher::{DispatchSettings, Dispatcher, TickReport, Transition};
pub use error::{AppError, DefaultErrorReporter, ErrorReporter, TracingErrorReporter};
pub use message::{MessageParseError, ResultMessage};
pub use partition::partition;
pub use run_state::{RunPlan, ToolRun};
pub use session_log::write_session_log;
pub use types::*;
pub use worker::{WorkerControl, WorkerEvent, WorkerId};
