use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "screenpilot", version, about = "Remote-brain mobile game automation agent")]
struct Cli {
    /// Path to config.toml (defaults: next to the executable, then the working directory)
    #[arg(long, global = true, env = "SCREENPILOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the capture/decide/execute loop until a stop decision or Ctrl-C
    Run {
        /// Use the gateway's mock decision endpoint
        #[arg(long)]
        mock: bool,
    },
    /// Print device, executor and gateway readiness
    Diagnose,
    /// Send one tap at (0.5, 0.6) to verify gesture injection
    TestTap,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = match cli.command {
        CliCommand::Run { mock } => screenpilot_lib::Command::Run {
            config: cli.config,
            mock,
        },
        CliCommand::Diagnose => screenpilot_lib::Command::Diagnose { config: cli.config },
        CliCommand::TestTap => screenpilot_lib::Command::TestTap { config: cli.config },
    };
    screenpilot_lib::run(command).await?;
    Ok(())
}
