use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(
    name = "walletlens",
    version,
    about = "Wallet feature engineering and clustering over pool transactions"
)]
pub struct Cli {
    /// Extra config file layered over config/default and config/local
    #[arg(long, global = true, env = "WALLETLENS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Aggregate transactions into per-wallet feature vectors
    Features(IoArgs),
    /// Cluster wallets with a single parameter setting
    Cluster {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        params: ClusterArgs,
    },
    /// Report quality metrics across a parameter range
    Sweep {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        params: ClusterArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(Debug, Args)]
pub struct IoArgs {
    /// JSON Lines transaction file, or '-' for stdin
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write JSON output (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Overrides for the configured clustering defaults
#[derive(Debug, Args, Default)]
pub struct ClusterArgs {
    #[arg(short, long, value_enum)]
    pub algorithm: Option<Algorithm>,

    /// Number of clusters (kmeans, embedding)
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Neighbourhood radius (dbscan)
    #[arg(long)]
    pub eps: Option<f64>,

    /// Minimum neighbourhood size (dbscan)
    #[arg(long)]
    pub min_points: Option<usize>,

    /// Principal components kept (embedding)
    #[arg(long)]
    pub components: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Cluster raw feature values instead of z-scores
    #[arg(long)]
    pub no_standardize: bool,

    /// Comma-separated feature columns to cluster on
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RangeArgs {
    #[arg(long, default_value_t = 2)]
    pub k_min: usize,

    #[arg(long, default_value_t = 10)]
    pub k_max: usize,

    #[arg(long, default_value_t = 0.1)]
    pub eps_min: f64,

    #[arg(long, default_value_t = 2.0)]
    pub eps_max: f64,

    #[arg(long, default_value_t = 0.1)]
    pub eps_step: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Kmeans,
    Dbscan,
    Embedding,
}
