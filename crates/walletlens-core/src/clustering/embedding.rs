//! Linear embedding (PCA) ahead of clustering
//!
//! Principal components are the eigenvectors of the feature covariance
//! matrix, taken in descending eigenvalue order.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::kmeans::{self, KMeansParams};
use crate::error::{LensError, LensResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingParams {
    /// Number of principal components to keep
    #[serde(default = "default_components")]
    pub components: usize,
    pub k: usize,
    #[serde(default = "kmeans::default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "kmeans::default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "kmeans::default_n_init")]
    pub n_init: usize,
    #[serde(default = "kmeans::default_seed")]
    pub seed: u64,
}

fn default_components() -> usize {
    2
}

impl EmbeddingParams {
    pub fn new(components: usize, k: usize) -> Self {
        Self {
            components,
            k,
            max_iterations: kmeans::default_max_iterations(),
            tolerance: kmeans::default_tolerance(),
            n_init: kmeans::default_n_init(),
            seed: kmeans::default_seed(),
        }
    }

    pub fn kmeans_params(&self) -> KMeansParams {
        KMeansParams {
            k: self.k,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            n_init: self.n_init,
            seed: self.seed,
        }
    }
}

/// Fitted principal-component projection
#[derive(Debug, Clone)]
pub struct PcaEmbedding {
    mean: Array1<f64>,
    /// One component per column (features x components)
    components: Array2<f64>,
    explained_variance: Vec<f64>,
    total_variance: f64,
}

impl PcaEmbedding {
    pub fn fit(data: &Array2<f64>, components: usize) -> LensResult<Self> {
        let (n, d) = data.dim();
        if n == 0 {
            return Err(LensError::InsufficientData("cannot embed an empty matrix".to_string()));
        }
        if components == 0 || components > d {
            return Err(LensError::InvalidConfig(format!(
                "components must be between 1 and {} (feature count), got {}",
                d, components
            )));
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| LensError::InsufficientData("empty matrix".to_string()))?;
        let centered = data - &mean;
        let covariance = centered.t().dot(&centered) / n as f64;
        let total_variance = covariance.diag().sum();

        // nalgebra takes the matrix by value
        let eigen = SymmetricEigen::new(DMatrix::from_fn(d, d, |i, j| covariance[[i, j]]));

        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .total_cmp(&eigen.eigenvalues[a])
                .then(a.cmp(&b))
        });

        let mut basis = Array2::<f64>::zeros((d, components));
        let mut explained_variance = Vec::with_capacity(components);
        for (c, &idx) in order.iter().take(components).enumerate() {
            let mut vector: Array1<f64> = eigen.eigenvectors.column(idx).iter().copied().collect();

            // Fix the sign so the largest loading is positive
            let pivot = vector
                .iter()
                .copied()
                .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            if pivot < 0.0 {
                vector.mapv_inplace(|v| -v);
            }

            basis.column_mut(c).assign(&vector);
            explained_variance.push(eigen.eigenvalues[idx].max(0.0));
        }

        tracing::debug!(
            components,
            explained = ?explained_variance,
            total_variance,
            "PCA embedding fitted"
        );

        Ok(Self {
            mean,
            components: basis,
            explained_variance,
            total_variance,
        })
    }

    pub fn transform(&self, data: &Array2<f64>) -> LensResult<Array2<f64>> {
        if data.ncols() != self.mean.len() {
            return Err(LensError::DimensionMismatch {
                expected: self.mean.len(),
                actual: data.ncols(),
            });
        }
        Ok((data - &self.mean).dot(&self.components))
    }

    /// Share of total variance captured by each component
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        if self.total_variance <= 0.0 {
            return vec![0.0; self.explained_variance.len()];
        }
        self.explained_variance
            .iter()
            .map(|v| v / self.total_variance)
            .collect()
    }
}
