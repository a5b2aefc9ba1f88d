//! ciq CLI
//!
//! Command-line interface for tracking builds on Jenkins CI servers.
//!
//! Architecture:
//! - Registry: runners and started jobs, persisted as JSON
//! - Stages: pipeline building blocks (sources, filters, query, sort)
//! - Renderers: terminal stages printing tables, CSV, summaries or JSON
//! - Commands: one pipeline per command, wired from the stages
//!
//! Logs go to stderr so stdout stays machine-readable.

mod commands;
mod config;
mod display;
mod filter;
mod glob;
mod render;
mod stages;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, Session, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ciq")]
#[command(about = "Query, start and track Jenkins CI builds", long_about = None)]
struct Cli {
    /// Registry file, defaults to ~/.ciq/default.json
    #[arg(long = "config", env = "CIQ_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env(cli.config)?;
    debug!("Using registry {}", config.registry_path.display());

    let session = Session::open(&config)?;
    handle_command(cli.command, session).await
}
