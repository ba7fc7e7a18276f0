//! walletlens
//!
//! Batch command-line front end for the wallet clustering pipeline. Reads
//! JSON Lines transaction exports and writes feature vectors, clustering
//! reports or parameter sweeps as JSON.
//!
//! Logs go to stderr so stdout stays clean for JSON output.

mod cli;
mod commands;
mod config;
mod error;
mod input;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("walletlens=info,walletlens_core=info")
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    tracing::debug!(
        algorithm = ?config.clustering.algorithm,
        standardize = config.features.standardize,
        stable_tokens = config.pricing.stable_tokens.len(),
        "Configuration loaded"
    );

    match &cli.command {
        Command::Features(io) => commands::run_features(&config, io)?,
        Command::Cluster { io, params } => commands::run_cluster(&config, io, params)?,
        Command::Sweep { io, params, range } => commands::run_sweep(&config, io, params, range)?,
    }

    Ok(())
}
