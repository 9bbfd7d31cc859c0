use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "cfebill")]
#[command(about = "Read a CFE electricity bill and fill the bill form from it")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the processing timeout, in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract bill fields and print the outcome as JSON
    Extract { file: Option<PathBuf> },

    /// Extract, apply corrections, and print the resulting form
    Apply {
        file: Option<PathBuf>,
        /// Correct a field before applying, e.g. `--set tariff=DAC`
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        sets: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }

    match cli.command {
        Commands::Extract { file } => commands::extract(file.as_deref(), &config).await,
        Commands::Apply { file, sets } => commands::apply(file.as_deref(), &sets, &config).await,
    }
}
