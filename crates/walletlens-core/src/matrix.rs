//! Feature matrix construction and scaling
//!
//! Turns a list of [`WalletFeatureVector`]s into a dense row-per-wallet matrix
//! suitable for distance-based clustering.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{LensError, LensResult};
use crate::models::WalletFeatureVector;

/// A scalar column that can be extracted from a feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    MintCount,
    BurnCount,
    SwapCount,
    TotalCount,
    DistinctTokenCount,
    StableTokenRatio,
    IntervalRegularity,
    AvgGasFee,
    TotalVolumeUsd,
    AvgTradeUsd,
    TxPerActiveDay,
    ActiveSpanDays,
    PriceVolatilityExposure,
    CumulativePnlUsd,
    ProfitabilityRatio,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 15] = [
        FeatureColumn::MintCount,
        FeatureColumn::BurnCount,
        FeatureColumn::SwapCount,
        FeatureColumn::TotalCount,
        FeatureColumn::DistinctTokenCount,
        FeatureColumn::StableTokenRatio,
        FeatureColumn::IntervalRegularity,
        FeatureColumn::AvgGasFee,
        FeatureColumn::TotalVolumeUsd,
        FeatureColumn::AvgTradeUsd,
        FeatureColumn::TxPerActiveDay,
        FeatureColumn::ActiveSpanDays,
        FeatureColumn::PriceVolatilityExposure,
        FeatureColumn::CumulativePnlUsd,
        FeatureColumn::ProfitabilityRatio,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::MintCount => "mint_count",
            FeatureColumn::BurnCount => "burn_count",
            FeatureColumn::SwapCount => "swap_count",
            FeatureColumn::TotalCount => "total_count",
            FeatureColumn::DistinctTokenCount => "distinct_token_count",
            FeatureColumn::StableTokenRatio => "stable_token_ratio",
            FeatureColumn::IntervalRegularity => "interval_regularity",
            FeatureColumn::AvgGasFee => "avg_gas_fee",
            FeatureColumn::TotalVolumeUsd => "total_volume_usd",
            FeatureColumn::AvgTradeUsd => "avg_trade_usd",
            FeatureColumn::TxPerActiveDay => "tx_per_active_day",
            FeatureColumn::ActiveSpanDays => "active_span_days",
            FeatureColumn::PriceVolatilityExposure => "price_volatility_exposure",
            FeatureColumn::CumulativePnlUsd => "cumulative_pnl_usd",
            FeatureColumn::ProfitabilityRatio => "profitability_ratio",
        }
    }

    /// Extract the column value; `None` when the feature is undefined for the wallet
    pub fn value(&self, features: &WalletFeatureVector) -> Option<f64> {
        match self {
            FeatureColumn::MintCount => Some(features.mint_count as f64),
            FeatureColumn::BurnCount => Some(features.burn_count as f64),
            FeatureColumn::SwapCount => Some(features.swap_count as f64),
            FeatureColumn::TotalCount => Some(features.total_count as f64),
            FeatureColumn::DistinctTokenCount => Some(features.distinct_token_count as f64),
            FeatureColumn::StableTokenRatio => Some(features.stable_token_ratio),
            FeatureColumn::IntervalRegularity => Some(features.interval_regularity),
            FeatureColumn::AvgGasFee => Some(features.avg_gas_fee),
            FeatureColumn::TotalVolumeUsd => Some(features.total_volume_usd),
            FeatureColumn::AvgTradeUsd => Some(features.avg_trade_usd),
            FeatureColumn::TxPerActiveDay => Some(features.tx_per_active_day),
            FeatureColumn::ActiveSpanDays => Some(features.active_span_days),
            FeatureColumn::PriceVolatilityExposure => Some(features.price_volatility_exposure),
            FeatureColumn::CumulativePnlUsd => features.cumulative_pnl_usd,
            FeatureColumn::ProfitabilityRatio => features.profitability_ratio,
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureColumn {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        FeatureColumn::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| LensError::UnknownFeature(s.to_string()))
    }
}

/// Ordered set of columns fed to the clusterer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection(pub Vec<FeatureColumn>);

impl Default for FeatureSelection {
    fn default() -> Self {
        Self(FeatureColumn::ALL.to_vec())
    }
}

impl FeatureSelection {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> LensResult<Self> {
        if names.is_empty() {
            return Ok(Self::default());
        }
        let columns = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<LensResult<Vec<_>>>()?;
        Ok(Self(columns))
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.0
    }
}

/// Dense feature matrix with one row per wallet
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    wallets: Vec<String>,
    columns: Vec<FeatureColumn>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    /// Build the matrix, imputing undefined values with the column median.
    ///
    /// A column with no defined value at all is filled with zeros.
    pub fn from_features(
        features: &[WalletFeatureVector],
        selection: &FeatureSelection,
    ) -> LensResult<Self> {
        if features.is_empty() {
            return Err(LensError::InsufficientData(
                "no wallet features to build a matrix from".to_string(),
            ));
        }
        if selection.columns().is_empty() {
            return Err(LensError::InvalidConfig("feature selection is empty".to_string()));
        }

        let columns = selection.columns().to_vec();
        let mut values = Array2::<f64>::zeros((features.len(), columns.len()));

        for (j, column) in columns.iter().enumerate() {
            let raw: Vec<Option<f64>> = features.iter().map(|f| column.value(f)).collect();
            let fill = median(raw.iter().flatten().copied().collect());
            let imputed = raw.iter().filter(|v| v.is_none()).count();
            if imputed > 0 {
                tracing::debug!(
                    column = %column,
                    imputed,
                    fill,
                    "Imputed undefined feature values"
                );
            }

            for (i, value) in raw.into_iter().enumerate() {
                let v = value.unwrap_or(fill);
                if !v.is_finite() {
                    return Err(LensError::NonFinite {
                        wallet: features[i].wallet.clone(),
                        column: column.name().to_string(),
                    });
                }
                values[[i, j]] = v;
            }
        }

        Ok(Self {
            wallets: features.iter().map(|f| f.wallet.clone()).collect(),
            columns,
            values,
        })
    }

    /// Build directly from raw rows. Mostly useful for tests and external embeddings.
    pub fn from_rows(
        wallets: Vec<String>,
        columns: Vec<FeatureColumn>,
        rows: Vec<Vec<f64>>,
    ) -> LensResult<Self> {
        if rows.len() != wallets.len() {
            return Err(LensError::DimensionMismatch {
                expected: wallets.len(),
                actual: rows.len(),
            });
        }
        let mut values = Array2::<f64>::zeros((rows.len(), columns.len()));
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(LensError::DimensionMismatch {
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            for (j, v) in row.iter().enumerate() {
                values[[i, j]] = *v;
            }
        }
        Ok(Self {
            wallets,
            columns,
            values,
        })
    }

    pub fn wallets(&self) -> &[String] {
        &self.wallets
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }
}

/// Z-score scaler fitted per column.
///
/// Zero-variance columns are centred but not scaled, so they become all zeros.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(values: &Array2<f64>) -> Self {
        let n = values.nrows().max(1) as f64;
        let mut means = Array1::<f64>::zeros(values.ncols());
        let mut stds = Array1::<f64>::zeros(values.ncols());

        for (j, column) in values.columns().into_iter().enumerate() {
            let mean = column.sum() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            means[j] = mean;
            stds[j] = variance.sqrt();
        }

        Self { means, stds }
    }

    pub fn transform(&self, values: &Array2<f64>) -> LensResult<Array2<f64>> {
        if values.ncols() != self.means.len() {
            return Err(LensError::DimensionMismatch {
                expected: self.means.len(),
                actual: values.ncols(),
            });
        }

        let mut scaled = values.clone();
        for ((_, j), v) in scaled.indexed_iter_mut() {
            let std = self.stds[j];
            *v = if std > f64::EPSILON {
                (*v - self.means[j]) / std
            } else {
                0.0
            };
        }
        Ok(scaled)
    }

    pub fn fit_transform(values: &Array2<f64>) -> LensResult<Array2<f64>> {
        Self::fit(values).transform(values)
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(wallet: &str, swaps: u64, pnl: Option<f64>) -> WalletFeatureVector {
        WalletFeatureVector {
            wallet: wallet.to_string(),
            mint_count: 0,
            burn_count: 0,
            swap_count: swaps,
            total_count: swaps,
            distinct_token_count: 2,
            stable_token_ratio: 0.5,
            interval_regularity: 0.0,
            avg_gas_fee: 1.0,
            total_volume_usd: 100.0,
            avg_trade_usd: 100.0 / swaps as f64,
            active_days: 1,
            tx_per_active_day: swaps as f64,
            active_span_days: 0.0,
            price_volatility_exposure: 0.0,
            cumulative_pnl_usd: pnl,
            time_weighted_exposure_usd: pnl.map(|_| 100.0),
            profitability_ratio: pnl.map(|p| p / 100.0),
            unpriced_tx_count: 0,
        }
    }

    #[test]
    fn test_column_parsing() {
        assert_eq!("swap_count".parse::<FeatureColumn>().unwrap(), FeatureColumn::SwapCount);
        assert!(matches!(
            "nonsense".parse::<FeatureColumn>(),
            Err(LensError::UnknownFeature(_))
        ));
        let selection =
            FeatureSelection::from_names(&["total_count", "cumulative_pnl_usd"]).unwrap();
        assert_eq!(selection.columns().len(), 2);
        let empty: [&str; 0] = [];
        assert_eq!(FeatureSelection::from_names(&empty).unwrap(), FeatureSelection::default());
    }

    #[test]
    fn test_missing_values_use_column_median() {
        let rows = vec![
            features("a", 1, Some(10.0)),
            features("b", 2, None),
            features("c", 3, Some(30.0)),
        ];
        let selection =
            FeatureSelection(vec![FeatureColumn::SwapCount, FeatureColumn::CumulativePnlUsd]);
        let matrix = FeatureMatrix::from_features(&rows, &selection).unwrap();

        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.values()[[1, 1]], 20.0);
        assert_eq!(matrix.values()[[2, 0]], 3.0);
        assert_eq!(matrix.wallets()[1], "b");
    }

    #[test]
    fn test_scaler_handles_constant_columns() {
        let matrix = FeatureMatrix::from_rows(
            vec!["a".into(), "b".into()],
            vec![FeatureColumn::SwapCount, FeatureColumn::AvgGasFee],
            vec![vec![1.0, 5.0], vec![3.0, 5.0]],
        )
        .unwrap();
        let scaled = StandardScaler::fit_transform(matrix.values()).unwrap();

        assert_eq!(scaled[[0, 0]], -1.0);
        assert_eq!(scaled[[1, 0]], 1.0);
        assert_eq!(scaled[[0, 1]], 0.0);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            FeatureMatrix::from_features(&[], &FeatureSelection::default()),
            Err(LensError::InsufficientData(_))
        ));
    }
}
