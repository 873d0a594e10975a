use clap::Parser;
use multimenu::{cli, logging};

#[tokio::main]
async fn main() -> multimenu::Result<()> {
    let args = cli::Args::parse();
    let _logging_guard = logging::init(&args.command)?;
    cli::run(args).await
}
