use crate::logging::context::ExecutionContext;
use serde::Deserialize;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::Subscriber;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::registry::LookupSpan;

/// Layer type returned by the console builder.
pub type ConsoleFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

/// Layer stack produced when a console layer is applied to a subscriber.
pub type ConsoleLayerStack<S> = Layered<ConsoleFmtLayer<S>, S>;

/// Where console logs should be emitted.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    Stdout,
    #[default]
    Stderr,
    None,
}

impl fmt::Display for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleOutput::Stdout => write!(f, "stdout"),
            ConsoleOutput::Stderr => write!(f, "stderr"),
            ConsoleOutput::None => write!(f, "none"),
        }
    }
}

impl FromStr for ConsoleOutput {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "stdout" => Ok(ConsoleOutput::Stdout),
            "stderr" => Ok(ConsoleOutput::Stderr),
            "none" => Ok(ConsoleOutput::None),
            _ => Err(format!(
                "invalid logging.console_output '{}'; supported values are stdout, stderr, none",
                value
            )),
        }
    }
}

/// Derive the console output sink from the execution context and optional user override.
///
/// Workers never log to stdout: every stdout line is parsed as a result message.
pub fn select_console_output(
    context: ExecutionContext,
    configured: Option<ConsoleOutput>,
) -> ConsoleOutput {
    if context.disables_console() {
        return ConsoleOutput::None;
    }
    configured.unwrap_or(ConsoleOutput::Stderr)
}

/// Build the console tracing layer for the provided subscriber type.
pub fn console_layer<S>(output: ConsoleOutput) -> ConsoleFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let make_writer = if let Some(writer) = test_override_writer() {
        writer
    } else {
        match output {
            ConsoleOutput::Stdout => BoxMakeWriter::new(io::stdout),
            ConsoleOutput::Stderr => BoxMakeWriter::new(io::stderr),
            ConsoleOutput::None => BoxMakeWriter::new(io::sink),
        }
    };

    tracing_fmt::layer()
        .with_writer(make_writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
}

type TestOutputSlot = OnceLock<Mutex<Option<Arc<Mutex<Vec<u8>>>>>>;

static TEST_OUTPUT: TestOutputSlot = OnceLock::new();

fn test_override_writer() -> Option<BoxMakeWriter> {
    let buffer = TEST_OUTPUT.get()?.lock().ok()?.clone()?;
    Some(BoxMakeWriter::new(move || TestGuard {
        buffer: buffer.clone(),
    }))
}

/// Capture console output in `buffer` instead of the real stream.
#[doc(hidden)]
pub fn set_test_output(buffer: Arc<Mutex<Vec<u8>>>) {
    if let Ok(mut slot) = TEST_OUTPUT.get_or_init(|| Mutex::new(None)).lock() {
        slot.replace(buffer);
    }
}

#[doc(hidden)]
pub fn clear_test_output() {
    if let Some(Ok(mut slot)) = TEST_OUTPUT.get().map(|slot| slot.lock()) {
        slot.take();
    }
}

struct TestGuard {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for TestGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .buffer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "test output poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
