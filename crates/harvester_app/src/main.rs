mod cli;
mod platform;

use std::process::ExitCode;

use clap::Parser;
use engine_logging::{LevelFilter, LogDestination, DEFAULT_LOG_FILE};

use cli::{Cli, LogTarget};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match cli.log {
        LogTarget::Terminal => LogDestination::Terminal,
        LogTarget::File => LogDestination::File(DEFAULT_LOG_FILE.into()),
        LogTarget::Both => LogDestination::Both(DEFAULT_LOG_FILE.into()),
    };
    engine_logging::initialize(destination, level);

    let mut config = platform::load_config(&cli.config)?;
    config.override_credentials(cli.token, cli.cookie);

    let report = platform::run_harvest(config, &cli.output).await?;
    println!("{}", platform::summary(&report));

    // Aborted runs exit non-zero so the scheduler can alert.
    Ok(if report.aborted.is_some() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}
