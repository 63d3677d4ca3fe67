use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use topowatch_cli::cli::Cli;
use topowatch_cli::commands;
use topowatch_cli::output::OutputWriter;

/// CLI logs stay out of stdout so `--output json` remains parseable.
const DEFAULT_LOG_LEVEL: &str = "warn";

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let writer = OutputWriter::new(cli.output);
    if let Err(e) = commands::dispatch(cli, &writer).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}
