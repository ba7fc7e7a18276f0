//! # walletlens core
//!
//! Wallet-level feature engineering and unsupervised clustering for
//! liquidity-pool transaction data (mint, burn and swap events).
//!
//! The pipeline has two stages. The [`aggregator`] folds each wallet's
//! time-ordered transactions into a [`WalletFeatureVector`], valuing a running
//! holdings ledger against a [`PriceBook`]. The [`clustering`] module then
//! labels every wallet with k-means, DBSCAN or a PCA embedding followed by
//! k-means, and reports internal quality metrics so the number of clusters can
//! be chosen by inspecting a [`sweep`](clustering::sweep) across a range.

pub mod aggregator;
pub mod clustering;
pub mod error;
pub mod ledger;
pub mod matrix;
pub mod models;
pub mod pipeline;
pub mod pricing;

pub use aggregator::{aggregate_all, aggregate_wallet};
pub use clustering::{
    cluster, sweep, ClusterSummary, ClusteringConfig, ClusteringOutcome, QualityMetrics,
    SweepConfig, SweepPoint,
};
pub use error::*;
pub use matrix::{FeatureColumn, FeatureMatrix, FeatureSelection, StandardScaler};
pub use models::*;
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use pricing::PriceBook;
