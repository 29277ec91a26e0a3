use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mhn_collector::logging::init_logging_from_env;
use mhn_collector::{run, CollectorConfig};

/// Relay honeypot events from a local hpfeeds broker to an upstream one.
#[derive(Debug, Parser)]
#[command(name = "mhn-collector", version, about)]
struct Args {
    /// JSON configuration file (defaults are used when omitted)
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging_from_env() {
        eprintln!("mhn-collector: {e}");
        return ExitCode::FAILURE;
    }

    let config = match CollectorConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(&config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Collector failed");
            ExitCode::FAILURE
        }
    }
}
