//! K-means with k-means++ seeding and Lloyd iterations

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{LensError, LensResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansParams {
    pub k: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence threshold on the largest squared centroid shift
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Independent restarts; the lowest-inertia run wins
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

pub(crate) fn default_max_iterations() -> usize {
    300
}

pub(crate) fn default_tolerance() -> f64 {
    1e-4
}

pub(crate) fn default_n_init() -> usize {
    10
}

pub(crate) fn default_seed() -> u64 {
    42
}

impl KMeansParams {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            n_init: default_n_init(),
            seed: default_seed(),
        }
    }

    pub fn validate(&self, n_rows: usize) -> LensResult<()> {
        if self.k == 0 {
            return Err(LensError::InvalidConfig("k must be at least 1".to_string()));
        }
        if self.k > n_rows {
            return Err(LensError::InvalidConfig(format!(
                "k = {} exceeds the number of wallets ({})",
                self.k, n_rows
            )));
        }
        if self.max_iterations == 0 || self.n_init == 0 {
            return Err(LensError::InvalidConfig(
                "max_iterations and n_init must be at least 1".to_string(),
            ));
        }
        if !(self.tolerance >= 0.0) {
            return Err(LensError::InvalidConfig("tolerance must be non-negative".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster index per row, numbered by first appearance
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    pub inertia: f64,
    pub iterations: usize,
}

pub fn fit(data: &Array2<f64>, params: &KMeansParams) -> LensResult<KMeansFit> {
    params.validate(data.nrows())?;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<KMeansFit> = None;

    for run in 0..params.n_init {
        let initial = plus_plus_init(data, params.k, &mut rng);
        let candidate = lloyd(data, initial, params);
        tracing::trace!(
            run,
            inertia = candidate.inertia,
            iterations = candidate.iterations,
            "k-means restart finished"
        );
        if best.as_ref().map_or(true, |b| candidate.inertia < b.inertia) {
            best = Some(candidate);
        }
    }

    let best = best
        .ok_or_else(|| LensError::InsufficientData("no k-means run completed".to_string()))?;
    Ok(canonicalize(best))
}

pub(crate) fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn plus_plus_init(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::<f64>::zeros((k, data.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut closest: Vec<f64> = (0..n)
        .map(|i| squared_distance(data.row(i), centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (i, d) in closest.iter().enumerate() {
                if *d > 0.0 && target < *d {
                    pick = i;
                    break;
                }
                target -= d;
            }
            pick
        } else {
            // Every point coincides with a chosen centroid
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&data.row(chosen));
        for (i, d) in closest.iter_mut().enumerate() {
            *d = d.min(squared_distance(data.row(i), centroids.row(c)));
        }
    }

    centroids
}

fn nearest(point: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn lloyd(data: &Array2<f64>, mut centroids: Array2<f64>, params: &KMeansParams) -> KMeansFit {
    let n = data.nrows();
    let k = centroids.nrows();
    let mut labels = vec![usize::MAX; n];
    let mut iterations = 0;

    for _ in 0..params.max_iterations {
        iterations += 1;

        let mut changed = false;
        for i in 0..n {
            let (c, _) = nearest(data.row(i), &centroids);
            if labels[i] != c {
                labels[i] = c;
                changed = true;
            }
        }

        let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
        let mut counts = vec![0usize; k];
        for i in 0..n {
            let mut row = sums.row_mut(labels[i]);
            row += &data.row(i);
            counts[labels[i]] += 1;
        }

        let mut shift: f64 = 0.0;
        for c in 0..k {
            let updated = if counts[c] > 0 {
                sums.row(c).mapv(|v| v / counts[c] as f64)
            } else {
                // Re-seed an empty cluster at the point farthest from its centroid
                let far = (0..n)
                    .max_by(|&a, &b| {
                        let da = squared_distance(data.row(a), centroids.row(labels[a]));
                        let db = squared_distance(data.row(b), centroids.row(labels[b]));
                        da.total_cmp(&db).then(b.cmp(&a))
                    })
                    .unwrap_or(0);
                changed = true;
                data.row(far).to_owned()
            };
            shift = shift.max(squared_distance(updated.view(), centroids.row(c)));
            centroids.row_mut(c).assign(&updated);
        }

        if !changed || shift <= params.tolerance {
            break;
        }
    }

    let mut inertia = 0.0;
    for i in 0..n {
        let (c, d) = nearest(data.row(i), &centroids);
        labels[i] = c;
        inertia += d;
    }

    KMeansFit {
        labels,
        centroids,
        inertia,
        iterations,
    }
}

/// Renumber clusters by the first row that belongs to each
fn canonicalize(fit: KMeansFit) -> KMeansFit {
    let k = fit.centroids.nrows();
    let mut mapping = vec![usize::MAX; k];
    let mut next = 0;
    for &label in &fit.labels {
        if mapping[label] == usize::MAX {
            mapping[label] = next;
            next += 1;
        }
    }
    for slot in mapping.iter_mut() {
        if *slot == usize::MAX {
            *slot = next;
            next += 1;
        }
    }

    let mut centroids = Array2::<f64>::zeros(fit.centroids.raw_dim());
    for (old, &new) in mapping.iter().enumerate() {
        centroids.row_mut(new).assign(&fit.centroids.row(old));
    }

    KMeansFit {
        labels: fit.labels.iter().map(|&l| mapping[l]).collect(),
        centroids,
        inertia: fit.inertia,
        iterations: fit.iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [10.0, 10.0],
            [10.1, 9.9],
            [9.8, 10.2],
        ]
    }

    #[test]
    fn test_separates_two_blobs() {
        let fit = fit(&blobs(), &KMeansParams::new(2)).unwrap();
        assert_eq!(fit.labels, vec![0, 0, 0, 1, 1, 1]);
        assert!(fit.inertia < 1.0);
        assert!((fit.centroids[[1, 0]] - 9.9667).abs() < 1e-3);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let params = KMeansParams::new(3);
        let a = fit(&blobs(), &params).unwrap();
        let b = fit(&blobs(), &params).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia.to_bits(), b.inertia.to_bits());
    }

    #[test]
    fn test_k_equal_to_rows_has_zero_inertia() {
        let fit = fit(&blobs(), &KMeansParams::new(6)).unwrap();
        assert_eq!(fit.inertia, 0.0);
        assert_eq!(fit.labels, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_invalid_k() {
        assert!(fit(&blobs(), &KMeansParams::new(0)).is_err());
        assert!(fit(&blobs(), &KMeansParams::new(7)).is_err());
    }

    #[test]
    fn test_duplicate_points() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let fit = fit(&data, &KMeansParams::new(2)).unwrap();
        assert_eq!(fit.labels.len(), 3);
        assert_eq!(fit.inertia, 0.0);
    }
}
