//! Reentrenar service entry point
//!
//! # Usage
//!
//! ```bash
//! # Run the monitoring daemon over a synthetic demo population
//! reentrenar run --config service.yaml
//!
//! # Force a single retraining cycle
//! reentrenar once --config service.yaml
//!
//! # Dump the persisted performance history
//! reentrenar history --config service.yaml
//! ```

use clap::Parser;
use reentrenar::cli::{run_command, Cli};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
