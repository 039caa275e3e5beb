use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use crate::cli::args::{Cli, CliCommand};

fn main() {
    if let Err(err) = run() {
        eprintln!("vault-bootstrap error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = commands::load_settings(&cli.global)?;

    match cli.command {
        CliCommand::Bootstrap(args) => {
            let runtime = tokio::runtime::Runtime::new()
                .context("Failed to initialize async runtime for bootstrap")?;
            runtime.block_on(commands::bootstrap::run_bootstrap(&settings, &args))?;
        }
        CliCommand::Health => {
            let runtime = tokio::runtime::Runtime::new()
                .context("Failed to initialize async runtime for health")?;
            runtime.block_on(commands::health::run_health(&settings))?;
        }
        CliCommand::Plan => commands::plan::run_plan(&settings),
    }
    Ok(())
}
