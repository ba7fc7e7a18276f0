//! End-to-end batch run: price book, aggregation, matrix, clustering

use serde::{Deserialize, Serialize};

use crate::aggregator::aggregate_all;
use crate::clustering::{
    cluster, sweep, ClusteringConfig, ClusteringOutcome, SweepConfig, SweepPoint, SweepRange,
};
use crate::error::LensResult;
use crate::matrix::{FeatureMatrix, FeatureSelection};
use crate::models::{Transaction, WalletFeatureVector};
use crate::pricing::{PriceBook, DEFAULT_STABLE_TOKENS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_stable_tokens")]
    pub stable_tokens: Vec<String>,
    #[serde(default)]
    pub features: FeatureSelection,
    #[serde(default = "default_standardize")]
    pub standardize: bool,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    /// When set, the run sweeps this range instead of producing one clustering
    #[serde(default)]
    pub sweep: Option<SweepRange>,
}

fn default_stable_tokens() -> Vec<String> {
    DEFAULT_STABLE_TOKENS.iter().map(|t| t.to_string()).collect()
}

fn default_standardize() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stable_tokens: default_stable_tokens(),
            features: FeatureSelection::default(),
            standardize: default_standardize(),
            clustering: ClusteringConfig::default(),
            sweep: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub features: Vec<WalletFeatureVector>,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clustering: Option<ClusteringOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<Vec<SweepPoint>>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn price_book(&self, transactions: &[Transaction]) -> PriceBook {
        PriceBook::from_transactions(transactions, &self.config.stable_tokens)
    }

    /// Aggregation stage only
    pub fn features(&self, transactions: &[Transaction]) -> LensResult<Vec<WalletFeatureVector>> {
        let book = self.price_book(transactions);
        aggregate_all(transactions, &book)
    }

    pub fn run(&self, transactions: &[Transaction]) -> LensResult<PipelineReport> {
        let features = self.features(transactions)?;
        let matrix = FeatureMatrix::from_features(&features, &self.config.features)?;

        let (clustering, sweep_points) = match &self.config.sweep {
            Some(range) => {
                let sweep_config = SweepConfig {
                    base: self.config.clustering.clone(),
                    range: range.clone(),
                };
                (None, Some(sweep(&matrix, &sweep_config, self.config.standardize)?))
            }
            None => (
                Some(cluster(&matrix, &self.config.clustering, self.config.standardize)?),
                None,
            ),
        };

        Ok(PipelineReport {
            columns: matrix.column_names(),
            features,
            clustering,
            sweep: sweep_points,
        })
    }
}
