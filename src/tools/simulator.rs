//! Built-in test worker: reads items from stdin and reports a random outcome
//! for each after a random delay.
use crate::core::message::ResultMessage;
use rand::Rng;
use std::io::{self, BufRead, Write};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MessageFormat {
    /// `<tool><'Error: '?><tab separated fields>`
    #[default]
    Legacy,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    pub tool: String,
    pub max_delay: Duration,
    pub error_rate: f64,
    pub format: MessageFormat,
}

/// Process every stdin item; returns how many messages were written.
pub fn run_simulator<R, W, G>(
    options: &SimulatorOptions,
    input: R,
    mut output: W,
    rng: &mut G,
) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
    G: Rng,
{
    let max_delay_ms = options.max_delay.as_millis() as u64;
    let mut written = 0;
    for item in input.lines() {
        let item = item?;
        if item.trim().is_empty() {
            continue;
        }

        if max_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(rng.gen_range(0..=max_delay_ms)));
        }

        let message = simulate_item(&options.tool, options.error_rate, rng);
        let line = match options.format {
            MessageFormat::Legacy => message.to_legacy_line(),
            MessageFormat::Json => message.to_json_line(),
        };
        writeln!(output, "{}", line)?;
        output.flush()?;
        written += 1;
    }
    Ok(written)
}

fn simulate_item<G: Rng>(tool: &str, error_rate: f64, rng: &mut G) -> ResultMessage {
    let task = format!("randTask-{}", rng.gen_range(0..=1000));
    if rng.gen_bool(error_rate.clamp(0.0, 1.0)) {
        return ResultMessage::error(tool, vec![format!("{} experienced an error.", task)]);
    }

    let mut fields = vec![task];
    for _ in 0..3 {
        let value = rng.gen_range(2..=6) as f64 * rng.gen_range(1..=7) as f64 * rng.gen_range(1.0..10.0);
        fields.push(format!("{:.3}", value));
    }
    fields.push("This was a random task that multi menu is processing.".to_string());
    ResultMessage::result(tool, fields)
}
