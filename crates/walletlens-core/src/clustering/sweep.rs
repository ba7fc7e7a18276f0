//! Hyperparameter sweeps for elbow and silhouette inspection.
//!
//! A sweep reports metrics for every value in the range and never picks a
//! winner.

use serde::{Deserialize, Serialize};

use super::metrics::{self, QualityMetrics};
use super::{label_rows, prepare, ClusteringConfig, DbscanParams, EmbeddingParams, KMeansParams};
use crate::error::{LensError, LensResult};
use crate::matrix::FeatureMatrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "parameter", rename_all = "snake_case")]
pub enum SweepRange {
    /// Inclusive range of cluster counts (k-means and embedding)
    K { min: usize, max: usize },
    /// Inclusive range of neighbourhood radii (DBSCAN)
    Eps { min: f64, max: f64, step: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Template whose swept parameter is overwritten per point
    pub base: ClusteringConfig,
    pub range: SweepRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub parameter: String,
    pub value: f64,
    pub metrics: QualityMetrics,
}

/// Upper bound on the number of points one eps sweep may evaluate
pub const MAX_SWEEP_POINTS: usize = 10_000;

impl SweepConfig {
    fn points(&self, n_rows: usize) -> LensResult<Vec<(f64, ClusteringConfig)>> {
        match (&self.base, &self.range) {
            (ClusteringConfig::Kmeans(p), SweepRange::K { min, max }) => {
                Ok(k_values(*min, *max, n_rows)?
                    .map(|k| {
                        let params = KMeansParams { k, ..p.clone() };
                        (k as f64, ClusteringConfig::Kmeans(params))
                    })
                    .collect())
            }
            (ClusteringConfig::Embedding(p), SweepRange::K { min, max }) => {
                Ok(k_values(*min, *max, n_rows)?
                    .map(|k| {
                        let params = EmbeddingParams { k, ..p.clone() };
                        (k as f64, ClusteringConfig::Embedding(params))
                    })
                    .collect())
            }
            (ClusteringConfig::Dbscan(p), SweepRange::Eps { min, max, step }) => {
                let count = eps_count(*min, *max, *step)?;
                // Index-based so float steps don't accumulate error
                Ok((0..count)
                    .map(|i| {
                        let eps = min + i as f64 * step;
                        let params = DbscanParams { eps, ..p.clone() };
                        (eps, ClusteringConfig::Dbscan(params))
                    })
                    .collect())
            }
            (base, range) => Err(LensError::InvalidConfig(format!(
                "cannot sweep {:?} for algorithm {}",
                range,
                base.name()
            ))),
        }
    }
}

fn k_values(min: usize, max: usize, n_rows: usize) -> LensResult<impl Iterator<Item = usize>> {
    if min == 0 || min > max {
        return Err(LensError::InvalidConfig(format!(
            "invalid k range {}..={}",
            min, max
        )));
    }
    if max > n_rows {
        tracing::warn!(
            k_max = max,
            wallets = n_rows,
            "Skipping k values larger than wallet count"
        );
    }
    Ok(min..=max.min(n_rows))
}

fn eps_count(min: f64, max: f64, step: f64) -> LensResult<usize> {
    if !(min > 0.0) || !(step > 0.0) || min > max || !max.is_finite() {
        return Err(LensError::InvalidConfig(format!(
            "invalid eps range {}..={} step {}",
            min, max, step
        )));
    }

    let steps = ((max - min) / step + 1e-9).floor();
    if !steps.is_finite() || steps >= MAX_SWEEP_POINTS as f64 {
        return Err(LensError::InvalidConfig(format!(
            "eps range {}..={} step {} exceeds {} points",
            min, max, step, MAX_SWEEP_POINTS
        )));
    }
    Ok(steps as usize + 1)
}

/// Evaluate every parameter value in the sweep range.
///
/// Points are returned in ascending parameter order.
pub fn sweep(
    matrix: &FeatureMatrix,
    config: &SweepConfig,
    standardize: bool,
) -> LensResult<Vec<SweepPoint>> {
    let data = prepare(matrix, standardize)?;
    let parameter = match config.range {
        SweepRange::K { .. } => "k",
        SweepRange::Eps { .. } => "eps",
    };

    let mut results = Vec::new();
    for (value, point_config) in config.points(matrix.n_rows())? {
        let labelling = label_rows(&data, &point_config)?;
        let metrics = metrics::evaluate(&labelling.space, &labelling.labels);
        tracing::debug!(
            parameter,
            value,
            inertia = metrics.inertia,
            silhouette = ?metrics.silhouette,
            "Sweep point evaluated"
        );
        results.push(SweepPoint {
            parameter: parameter.to_string(),
            value,
            metrics,
        });
    }

    tracing::info!(
        algorithm = config.base.name(),
        parameter,
        points = results.len(),
        "Sweep finished"
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::FeatureColumn;

    fn matrix() -> FeatureMatrix {
        let rows = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 4.9],
            vec![10.0, 0.0],
            vec![10.2, 0.1],
        ];
        FeatureMatrix::from_rows(
            (0..rows.len()).map(|i| format!("w{}", i)).collect(),
            vec![FeatureColumn::SwapCount, FeatureColumn::AvgGasFee],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_k_sweep_reports_every_value() {
        let config = SweepConfig {
            base: ClusteringConfig::Kmeans(KMeansParams::new(2)),
            range: SweepRange::K { min: 1, max: 8 },
        };
        let points = sweep(&matrix(), &config, false).unwrap();

        let ks: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(ks, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(points.iter().all(|p| p.parameter == "k"));

        // Elbow at k = 3, where the three blobs separate
        assert!(points[1].metrics.inertia < points[0].metrics.inertia);
        assert!(points[2].metrics.inertia < points[1].metrics.inertia);
        assert!(points[2].metrics.inertia < 0.1);
        assert_eq!(points[5].metrics.inertia, 0.0);
        assert!(points[2].metrics.silhouette.unwrap() > points[1].metrics.silhouette.unwrap());
        assert_eq!(points[0].metrics.silhouette, None);
    }

    #[test]
    fn test_eps_sweep_steps_inclusively() {
        let config = SweepConfig {
            base: ClusteringConfig::Dbscan(DbscanParams::new(1.0, 2)),
            range: SweepRange::Eps { min: 0.1, max: 0.5, step: 0.1 },
        };
        let points = sweep(&matrix(), &config, false).unwrap();
        assert_eq!(points.len(), 5);
        assert!((points[4].value - 0.5).abs() < 1e-12);
        assert_eq!(points[0].metrics.cluster_count, 0);
        assert_eq!(points[4].metrics.cluster_count, 3);
    }

    #[test]
    fn test_eps_step_too_fine_is_rejected() {
        for step in [1e-320, 1e-9] {
            let config = SweepConfig {
                base: ClusteringConfig::Dbscan(DbscanParams::new(1.0, 2)),
                range: SweepRange::Eps { min: 0.1, max: 1.0, step },
            };
            assert!(matches!(
                sweep(&matrix(), &config, false),
                Err(LensError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_k_range_is_clamped_to_wallet_count() {
        let config = SweepConfig {
            base: ClusteringConfig::Kmeans(KMeansParams::new(2)),
            range: SweepRange::K { min: 2, max: usize::MAX },
        };
        let points = sweep(&matrix(), &config, false).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[4].value, 6.0);
    }

    #[test]
    fn test_embedding_k_sweep() {
        let config = SweepConfig {
            base: ClusteringConfig::Embedding(EmbeddingParams::new(2, 2)),
            range: SweepRange::K { min: 2, max: 3 },
        };
        let points = sweep(&matrix(), &config, false).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].metrics.cluster_count, 3);
    }

    #[test]
    fn test_mismatched_range_is_rejected() {
        let config = SweepConfig {
            base: ClusteringConfig::Dbscan(DbscanParams::new(1.0, 2)),
            range: SweepRange::K { min: 2, max: 4 },
        };
        assert!(matches!(
            sweep(&matrix(), &config, false),
            Err(LensError::InvalidConfig(_))
        ));
    }
}
