//! Density-based clustering (DBSCAN)

use std::collections::VecDeque;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::kmeans::squared_distance;
use crate::error::{LensError, LensResult};
use crate::models::ClusterLabel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    /// Neighbourhood radius (Euclidean, inclusive)
    pub eps: f64,
    /// Neighbours, including the point itself, needed to form a dense core
    #[serde(default = "default_min_points")]
    pub min_points: usize,
}

fn default_min_points() -> usize {
    5
}

impl DbscanParams {
    pub fn new(eps: f64, min_points: usize) -> Self {
        Self { eps, min_points }
    }

    pub fn validate(&self) -> LensResult<()> {
        if !(self.eps > 0.0) || !self.eps.is_finite() {
            return Err(LensError::InvalidConfig(format!(
                "eps must be a positive finite number, got {}",
                self.eps
            )));
        }
        if self.min_points == 0 {
            return Err(LensError::InvalidConfig("min_points must be at least 1".to_string()));
        }
        Ok(())
    }
}

pub fn fit(data: &Array2<f64>, params: &DbscanParams) -> LensResult<Vec<ClusterLabel>> {
    params.validate()?;

    let n = data.nrows();
    let eps_sq = params.eps * params.eps;
    let neighbours = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| squared_distance(data.row(i), data.row(j)) <= eps_sq)
            .collect()
    };

    let mut labels: Vec<Option<ClusterLabel>> = vec![None; n];
    let mut next_cluster = 0;

    for i in 0..n {
        if labels[i].is_some() {
            continue;
        }

        let seeds = neighbours(i);
        if seeds.len() < params.min_points {
            labels[i] = Some(ClusterLabel::Noise);
            continue;
        }

        let cluster = ClusterLabel::Cluster(next_cluster);
        next_cluster += 1;
        labels[i] = Some(cluster);

        let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            let current = labels[j];
            match current {
                // Border point previously written off as noise
                Some(ClusterLabel::Noise) => labels[j] = Some(cluster),
                Some(_) => continue,
                None => {
                    labels[j] = Some(cluster);
                    let reachable = neighbours(j);
                    if reachable.len() >= params.min_points {
                        queue.extend(reachable.into_iter().filter(|&m| {
                            matches!(labels[m], None | Some(ClusterLabel::Noise))
                        }));
                    }
                }
            }
        }
    }

    let noise = labels.iter().filter(|l| **l == Some(ClusterLabel::Noise)).count();
    tracing::debug!(clusters = next_cluster, noise, eps = params.eps, "DBSCAN finished");

    Ok(labels
        .into_iter()
        .map(|l| l.unwrap_or(ClusterLabel::Noise))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_two_dense_groups_and_an_outlier() {
        let data = array![
            [0.0, 0.0],
            [0.0, 0.5],
            [0.5, 0.0],
            [5.0, 5.0],
            [5.0, 5.5],
            [5.5, 5.0],
            [50.0, 50.0],
        ];
        let labels = fit(&data, &DbscanParams::new(1.0, 3)).unwrap();

        assert_eq!(
            labels,
            vec![
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(1),
                ClusterLabel::Cluster(1),
                ClusterLabel::Cluster(1),
                ClusterLabel::Noise,
            ]
        );
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // Point 0 has only one neighbour, but sits within eps of the core at index 1
        let data = array![[0.0], [0.9], [1.0], [1.1]];
        let labels = fit(&data, &DbscanParams::new(0.95, 3)).unwrap();
        assert_eq!(labels, vec![ClusterLabel::Cluster(0); 4]);
    }

    #[test]
    fn test_invalid_params() {
        let data = array![[0.0]];
        assert!(fit(&data, &DbscanParams::new(0.0, 3)).is_err());
        assert!(fit(&data, &DbscanParams::new(1.0, 0)).is_err());
    }
}
