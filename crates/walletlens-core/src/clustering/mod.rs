//! Wallet clustering
//!
//! Assigns every row of a [`FeatureMatrix`] exactly one [`ClusterLabel`] and
//! reports quality metrics plus per-cluster summaries in original feature
//! units.

pub mod dbscan;
pub mod embedding;
pub mod kmeans;
pub mod metrics;
pub mod sweep;

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::LensResult;
use crate::matrix::{FeatureMatrix, StandardScaler};
use crate::models::{ClusterAssignment, ClusterLabel};

pub use dbscan::DbscanParams;
pub use embedding::{EmbeddingParams, PcaEmbedding};
pub use kmeans::KMeansParams;
pub use metrics::QualityMetrics;
pub use sweep::{sweep, SweepConfig, SweepPoint, SweepRange};

/// Algorithm selection plus its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClusteringConfig {
    Kmeans(KMeansParams),
    Dbscan(DbscanParams),
    /// PCA embedding followed by k-means on the embedded rows
    Embedding(EmbeddingParams),
}

impl ClusteringConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ClusteringConfig::Kmeans(_) => "kmeans",
            ClusteringConfig::Dbscan(_) => "dbscan",
            ClusteringConfig::Embedding(_) => "embedding",
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        ClusteringConfig::Kmeans(KMeansParams::new(4))
    }
}

/// Per-cluster statistics in unscaled feature units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub label: ClusterLabel,
    pub size: usize,
    /// Fraction of all wallets in this cluster
    pub share: f64,
    pub means: BTreeMap<String, f64>,
    pub std_devs: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSummary {
    pub components: usize,
    pub explained_variance_ratio: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringOutcome {
    pub algorithm: String,
    pub config: ClusteringConfig,
    /// One assignment per matrix row, in row order
    pub assignments: Vec<ClusterAssignment>,
    pub metrics: QualityMetrics,
    pub summaries: Vec<ClusterSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingSummary>,
}

/// Labels plus the space they were computed in
pub(crate) struct Labelling {
    pub labels: Vec<ClusterLabel>,
    pub space: Array2<f64>,
    pub embedding: Option<EmbeddingSummary>,
}

/// Run one algorithm over already-prepared (scaled or raw) rows
pub(crate) fn label_rows(data: &Array2<f64>, config: &ClusteringConfig) -> LensResult<Labelling> {
    match config {
        ClusteringConfig::Kmeans(params) => {
            let fit = kmeans::fit(data, params)?;
            Ok(Labelling {
                labels: fit.labels.into_iter().map(ClusterLabel::Cluster).collect(),
                space: data.clone(),
                embedding: None,
            })
        }
        ClusteringConfig::Dbscan(params) => Ok(Labelling {
            labels: dbscan::fit(data, params)?,
            space: data.clone(),
            embedding: None,
        }),
        ClusteringConfig::Embedding(params) => {
            let pca = PcaEmbedding::fit(data, params.components)?;
            let embedded = pca.transform(data)?;
            let fit = kmeans::fit(&embedded, &params.kmeans_params())?;
            Ok(Labelling {
                labels: fit.labels.into_iter().map(ClusterLabel::Cluster).collect(),
                space: embedded,
                embedding: Some(EmbeddingSummary {
                    components: params.components,
                    explained_variance_ratio: pca.explained_variance_ratio(),
                }),
            })
        }
    }
}

pub(crate) fn prepare(matrix: &FeatureMatrix, standardize: bool) -> LensResult<Array2<f64>> {
    if standardize {
        StandardScaler::fit_transform(matrix.values())
    } else {
        Ok(matrix.values().clone())
    }
}

/// Cluster every wallet in `matrix`.
///
/// When `standardize` is set the columns are z-scored first; summaries are
/// always reported in the matrix's original units.
pub fn cluster(
    matrix: &FeatureMatrix,
    config: &ClusteringConfig,
    standardize: bool,
) -> LensResult<ClusteringOutcome> {
    let data = prepare(matrix, standardize)?;
    let labelling = label_rows(&data, config)?;
    let metrics = metrics::evaluate(&labelling.space, &labelling.labels);

    tracing::info!(
        algorithm = config.name(),
        wallets = matrix.n_rows(),
        clusters = metrics.cluster_count,
        noise = metrics.noise_count,
        inertia = metrics.inertia,
        silhouette = ?metrics.silhouette,
        "Clustering finished"
    );

    let assignments = matrix
        .wallets()
        .iter()
        .zip(&labelling.labels)
        .map(|(wallet, label)| ClusterAssignment {
            wallet: wallet.clone(),
            label: *label,
        })
        .collect();

    Ok(ClusteringOutcome {
        algorithm: config.name().to_string(),
        config: config.clone(),
        assignments,
        summaries: summarize(matrix, &labelling.labels),
        metrics,
        embedding: labelling.embedding,
    })
}

/// Size, mean and standard deviation per cluster (noise last, if any)
pub fn summarize(matrix: &FeatureMatrix, labels: &[ClusterLabel]) -> Vec<ClusterSummary> {
    let mut groups: BTreeMap<ClusterLabel, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        groups.entry(*label).or_default().push(i);
    }

    let total = labels.len().max(1) as f64;
    let values = matrix.values();

    groups
        .into_iter()
        .map(|(label, rows)| {
            let size = rows.len();
            let mut means = BTreeMap::new();
            let mut std_devs = BTreeMap::new();

            for (j, column) in matrix.columns().iter().enumerate() {
                let column_values: Vec<f64> = rows.iter().map(|&i| values[[i, j]]).collect();
                let mean = column_values.iter().sum::<f64>() / size as f64;
                let variance = column_values
                    .iter()
                    .map(|v| (v - mean).powi(2))
                    .sum::<f64>()
                    / size as f64;
                means.insert(column.name().to_string(), mean);
                std_devs.insert(column.name().to_string(), variance.sqrt());
            }

            ClusterSummary {
                label,
                size,
                share: size as f64 / total,
                means,
                std_devs,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::FeatureColumn;

    fn matrix() -> FeatureMatrix {
        FeatureMatrix::from_rows(
            (0..6).map(|i| format!("w{}", i)).collect(),
            vec![FeatureColumn::SwapCount, FeatureColumn::CumulativePnlUsd],
            vec![
                vec![1.0, -10.0],
                vec![2.0, -12.0],
                vec![1.0, -11.0],
                vec![50.0, 500.0],
                vec![52.0, 520.0],
                vec![51.0, 510.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_every_wallet_labelled_once() {
        let m = matrix();
        for config in [
            ClusteringConfig::Kmeans(KMeansParams::new(2)),
            ClusteringConfig::Dbscan(DbscanParams::new(0.5, 2)),
            ClusteringConfig::Embedding(EmbeddingParams::new(1, 2)),
        ] {
            let outcome = cluster(&m, &config, true).unwrap();
            let wallets: Vec<&str> =
                outcome.assignments.iter().map(|a| a.wallet.as_str()).collect();
            assert_eq!(wallets, vec!["w0", "w1", "w2", "w3", "w4", "w5"], "{}", config.name());
        }
    }

    #[test]
    fn test_kmeans_summaries_in_original_units() {
        let config = ClusteringConfig::Kmeans(KMeansParams::new(2));
        let outcome = cluster(&matrix(), &config, true).unwrap();

        assert_eq!(outcome.metrics.cluster_count, 2);
        assert_eq!(outcome.summaries.len(), 2);
        let whales = &outcome.summaries[1];
        assert_eq!(whales.label, ClusterLabel::Cluster(1));
        assert_eq!(whales.size, 3);
        assert_eq!(whales.share, 0.5);
        assert_eq!(whales.means["cumulative_pnl_usd"], 510.0);
        assert_eq!(whales.means["swap_count"], 51.0);
    }

    #[test]
    fn test_embedding_reports_variance() {
        let config = ClusteringConfig::Embedding(EmbeddingParams::new(1, 2));
        let outcome = cluster(&matrix(), &config, true).unwrap();
        let embedding = outcome.embedding.unwrap();
        assert_eq!(embedding.components, 1);
        assert!(embedding.explained_variance_ratio[0] > 0.9);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ClusteringConfig =
            serde_json::from_str(r#"{"algorithm": "kmeans", "k": 3}"#).unwrap();
        assert_eq!(config, ClusteringConfig::Kmeans(KMeansParams::new(3)));

        let config: ClusteringConfig =
            serde_json::from_str(r#"{"algorithm": "dbscan", "eps": 0.3}"#).unwrap();
        assert_eq!(config, ClusteringConfig::Dbscan(DbscanParams::new(0.3, 5)));
    }
}
