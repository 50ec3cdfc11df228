pub mod agent_engine;
pub mod commands;
pub mod config;
pub mod decision;
pub mod device;
pub mod errors;
pub mod executor;
pub mod perception;

use std::path::PathBuf;

use crate::config::AppConfig;
use crate::errors::PilotResult;

/// Top-level operations exposed by the binary.
#[derive(Debug, Clone)]
pub enum Command {
    /// Run the control loop until a `stop` decision or Ctrl-C.
    Run { config: Option<PathBuf>, mock: bool },
    /// Print device and gateway readiness.
    Diagnose { config: Option<PathBuf> },
    /// Issue one test tap through the executor handle.
    TestTap { config: Option<PathBuf> },
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

fn bootstrap(config_path: Option<&std::path::Path>) -> PilotResult<AppConfig> {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
    config::load_config(config_path)
}

pub async fn run(command: Command) -> PilotResult<()> {
    init_tracing();

    match command {
        Command::Run { config, mock } => {
            let mut cfg = bootstrap(config.as_deref())?;
            if mock {
                cfg.gateway.mock = true;
            }
            let report = commands::run_agent(cfg).await?;
            tracing::info!(
                exit = ?report.exit,
                cycles = report.cycles,
                history = report.history.len(),
                "session finished"
            );
        }
        Command::Diagnose { config } => {
            let cfg = bootstrap(config.as_deref())?;
            let diagnosis = commands::diagnose(&cfg).await;
            println!("{diagnosis}");
        }
        Command::TestTap { config } => {
            let cfg = bootstrap(config.as_deref())?;
            commands::test_tap(&cfg).await?;
            println!("test tap sent");
        }
    }
    Ok(())
}
