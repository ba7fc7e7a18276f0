//! Internal cluster-quality metrics
//!
//! These do not pick a "correct" clustering; they are read off an elbow or
//! silhouette curve across a sweep by whoever is labelling the clusters.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::kmeans::squared_distance;
use crate::models::ClusterLabel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub cluster_count: usize,
    pub noise_count: usize,
    /// Sum of squared distances from each clustered point to its centroid
    pub inertia: f64,
    /// Mean distance from each clustered point to its centroid
    pub mean_intra_distance: f64,
    /// Mean pairwise distance between centroids; `None` with fewer than two clusters
    pub mean_inter_centroid_distance: Option<f64>,
    /// Mean silhouette over clustered points; `None` when undefined
    pub silhouette: Option<f64>,
}

/// Mean of the member rows of each cluster, indexed by cluster number
pub fn centroids(data: &Array2<f64>, labels: &[ClusterLabel]) -> Vec<Array1<f64>> {
    let cluster_count = count_clusters(labels);
    let mut sums = vec![Array1::<f64>::zeros(data.ncols()); cluster_count];
    let mut counts = vec![0usize; cluster_count];

    for (i, label) in labels.iter().enumerate() {
        if let Some(c) = label.index() {
            sums[c] += &data.row(i);
            counts[c] += 1;
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| if count > 0 { sum / count as f64 } else { sum })
        .collect()
}

pub fn evaluate(data: &Array2<f64>, labels: &[ClusterLabel]) -> QualityMetrics {
    let cluster_count = count_clusters(labels);
    let noise_count = labels.iter().filter(|l| l.is_noise()).count();
    let centers = centroids(data, labels);

    let mut inertia = 0.0;
    let mut distance_sum = 0.0;
    let mut clustered = 0usize;
    for (i, label) in labels.iter().enumerate() {
        if let Some(c) = label.index() {
            let d = squared_distance(data.row(i), centers[c].view());
            inertia += d;
            distance_sum += d.sqrt();
            clustered += 1;
        }
    }

    let mean_intra_distance = if clustered > 0 {
        distance_sum / clustered as f64
    } else {
        0.0
    };

    let mean_inter_centroid_distance = if cluster_count >= 2 {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for a in 0..cluster_count {
            for b in (a + 1)..cluster_count {
                total += squared_distance(centers[a].view(), centers[b].view()).sqrt();
                pairs += 1;
            }
        }
        Some(total / pairs as f64)
    } else {
        None
    };

    QualityMetrics {
        cluster_count,
        noise_count,
        inertia,
        mean_intra_distance,
        mean_inter_centroid_distance,
        silhouette: silhouette(data, labels, cluster_count),
    }
}

/// Mean silhouette coefficient over non-noise points.
///
/// Defined only for `2 <= clusters < clustered points`. Singleton clusters
/// contribute a coefficient of 0.
pub fn silhouette(
    data: &Array2<f64>,
    labels: &[ClusterLabel],
    cluster_count: usize,
) -> Option<f64> {
    let members: Vec<(usize, usize)> = labels
        .iter()
        .enumerate()
        .filter_map(|(i, l)| l.index().map(|c| (i, c)))
        .collect();

    if cluster_count < 2 || cluster_count >= members.len() {
        return None;
    }

    let mut sizes = vec![0usize; cluster_count];
    for &(_, c) in &members {
        sizes[c] += 1;
    }

    let mut total = 0.0;
    for &(i, own) in &members {
        if sizes[own] <= 1 {
            continue;
        }

        let mut sums = vec![0.0; cluster_count];
        for &(j, other) in &members {
            if i != j {
                sums[other] += squared_distance(data.row(i), data.row(j)).sqrt();
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..cluster_count)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 && b.is_finite() {
            total += (b - a) / denom;
        }
    }

    Some(total / members.len() as f64)
}

fn count_clusters(labels: &[ClusterLabel]) -> usize {
    labels
        .iter()
        .filter_map(|l| l.index())
        .max()
        .map_or(0, |m| m + 1)
}
