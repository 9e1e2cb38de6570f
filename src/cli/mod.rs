//! Reentrenar CLI
//!
//! Thin command layer over the retraining service. The daemon and
//! single-cycle commands run against a synthetic in-memory provider so the
//! service can be exercised without a live behavior store; hosting
//! applications are expected to construct [`Retrainer`] directly with
//! their own [`DataProvider`](crate::data::DataProvider).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::RetrainConfig;
use crate::data::MemoryProvider;
use crate::error::Result;
use crate::retrain::Retrainer;

/// Automated retraining service for user-behavior models
#[derive(Debug, Parser)]
#[command(name = "reentrenar", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the monitoring service until interrupted
    Run {
        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Synthetic users to seed the demo data provider with
        #[arg(long, default_value_t = 1_000)]
        synthetic_users: usize,
        /// Seconds between status log lines
        #[arg(long, default_value_t = 60)]
        status_interval_secs: u64,
    },
    /// Force exactly one retraining cycle and exit
    Once {
        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Synthetic users to seed the demo data provider with
        #[arg(long, default_value_t = 1_000)]
        synthetic_users: usize,
    },
    /// Print the persisted performance history as JSON
    History {
        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Demo seed for the synthetic provider; fixed so repeated runs see the
/// same population.
const SYNTHETIC_SEED: u64 = 42;

fn load_config(path: Option<&PathBuf>) -> Result<RetrainConfig> {
    match path {
        Some(path) => RetrainConfig::from_yaml_file(path),
        None => Ok(RetrainConfig::default()),
    }
}

fn demo_service(config: RetrainConfig, synthetic_users: usize) -> Result<Arc<Retrainer>> {
    info!(synthetic_users, "using synthetic in-memory data provider");
    let provider = Arc::new(MemoryProvider::synthetic(synthetic_users, SYNTHETIC_SEED));
    Ok(Arc::new(Retrainer::new(config, provider)?))
}

/// Execute a parsed CLI command
pub fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config, synthetic_users, status_interval_secs } => {
            let service = demo_service(load_config(config.as_ref())?, synthetic_users)?;
            service.start_monitoring();

            loop {
                std::thread::sleep(Duration::from_secs(status_interval_secs));
                let status = service.status();
                info!(
                    running = status.running,
                    new_samples = status.new_sample_count,
                    history = status.history_length,
                    "retraining status"
                );
            }
        }
        Commands::Once { config, synthetic_users } => {
            let service = demo_service(load_config(config.as_ref())?, synthetic_users)?;
            let outcome = service.run_cycle()?;
            println!("{outcome:?}");
            Ok(())
        }
        Commands::History { config } => {
            let config = load_config(config.as_ref())?;
            let content = match std::fs::read_to_string(&config.history_path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => "[]".to_string(),
                Err(e) => return Err(e.into()),
            };
            println!("{content}");
            Ok(())
        }
    }
}
