//! Data models for the wallet clustering pipeline
//!
//! Transactions come from an upstream export and are never mutated here.
//! Everything else (feature vectors, labels) is derived from them per run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LensError;

// =============================================================================
// Transaction Domain Models
// =============================================================================

/// Kind of liquidity-pool interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Deposit of both pair tokens into a pool
    Mint,
    /// Withdrawal of both pair tokens from a pool
    Burn,
    /// Exchange of one pair token for the other
    Swap,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Mint => write!(f, "mint"),
            TransactionKind::Burn => write!(f, "burn"),
            TransactionKind::Swap => write!(f, "swap"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mint" => Ok(TransactionKind::Mint),
            "burn" => Ok(TransactionKind::Burn),
            "swap" => Ok(TransactionKind::Swap),
            other => Err(LensError::Parse(format!("unknown transaction kind '{}'", other))),
        }
    }
}

/// The two tokens held by a liquidity pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenPair {
    pub token0: String,
    pub token1: String,
}

impl TokenPair {
    pub fn new(token0: impl Into<String>, token1: impl Into<String>) -> Self {
        Self {
            token0: token0.into(),
            token1: token1.into(),
        }
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.token0, self.token1)
    }
}

/// A single pool transaction initiated by a wallet.
///
/// Token deltas are signed from the wallet's point of view: positive means
/// the wallet received the token, negative means it paid it. A mint therefore
/// carries two negative deltas, a burn two positive ones, and a swap one of each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash, used as the final ordering tie-break
    pub tx_hash: String,

    /// Wallet that initiated the transaction
    pub wallet: String,

    pub kind: TransactionKind,

    /// Pool token pair
    pub pair: TokenPair,

    /// Signed change of token0 held by the wallet
    pub token0_delta: Decimal,

    /// Signed change of token1 held by the wallet
    pub token1_delta: Decimal,

    /// USD value of the transaction
    pub amount_usd: Decimal,

    /// Execution time
    pub timestamp: DateTime<Utc>,

    /// Gas fee paid
    #[serde(default)]
    pub gas_fee: Decimal,
}

impl Transaction {
    /// Both token legs as `(token, signed delta)`
    pub fn legs(&self) -> [(&str, Decimal); 2] {
        [
            (self.pair.token0.as_str(), self.token0_delta),
            (self.pair.token1.as_str(), self.token1_delta),
        ]
    }

    /// Sort key giving the canonical processing order
    pub fn order_key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, self.tx_hash.as_str())
    }
}

// =============================================================================
// Feature Models
// =============================================================================

/// Per-wallet engineered features.
///
/// Values are a deterministic function of the wallet's timestamp-ordered
/// transaction sequence and the price book it was valued against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletFeatureVector {
    pub wallet: String,

    pub mint_count: u64,
    pub burn_count: u64,
    pub swap_count: u64,
    pub total_count: u64,

    /// Number of distinct tokens appearing in any leg
    pub distinct_token_count: u64,

    /// Share of token legs that reference a stable token (0..=1)
    pub stable_token_ratio: f64,

    /// `1 / (1 + cv)` of inter-transaction gaps; 1 means perfectly even spacing
    pub interval_regularity: f64,

    pub avg_gas_fee: f64,

    pub total_volume_usd: f64,
    pub avg_trade_usd: f64,

    /// Distinct UTC calendar days with at least one transaction
    pub active_days: u64,
    pub tx_per_active_day: f64,

    /// Days between first and last transaction
    pub active_span_days: f64,

    /// USD-weighted average price coefficient of variation of traded tokens
    pub price_volatility_exposure: f64,

    /// Final mark-to-market valuation of the holdings ledger
    pub cumulative_pnl_usd: Option<f64>,

    /// Time-weighted average of long exposure over the wallet's active span
    pub time_weighted_exposure_usd: Option<f64>,

    /// `cumulative_pnl_usd / time_weighted_exposure_usd`
    pub profitability_ratio: Option<f64>,

    /// Transactions left out of the ledger for lack of a price reference
    pub unpriced_tx_count: u64,
}

// =============================================================================
// Clustering Models
// =============================================================================

/// Cluster label for a wallet. Serialized as the cluster index, or `-1` for noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum ClusterLabel {
    Cluster(usize),
    Noise,
}

impl ClusterLabel {
    pub fn index(&self) -> Option<usize> {
        match self {
            ClusterLabel::Cluster(i) => Some(*i),
            ClusterLabel::Noise => None,
        }
    }

    pub fn is_noise(&self) -> bool {
        matches!(self, ClusterLabel::Noise)
    }
}

impl From<ClusterLabel> for i64 {
    fn from(label: ClusterLabel) -> Self {
        match label {
            ClusterLabel::Cluster(i) => i as i64,
            ClusterLabel::Noise => -1,
        }
    }
}

impl TryFrom<i64> for ClusterLabel {
    type Error = LensError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(ClusterLabel::Noise),
            v if v >= 0 => Ok(ClusterLabel::Cluster(v as usize)),
            v => Err(LensError::Parse(format!("invalid cluster label {}", v))),
        }
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterLabel::Cluster(i) => write!(f, "{}", i),
            ClusterLabel::Noise => write!(f, "noise"),
        }
    }
}

/// One wallet's label from a clustering run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub wallet: String,
    pub label: ClusterLabel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("SWAP".parse::<TransactionKind>().unwrap(), TransactionKind::Swap);
        assert_eq!("mint".parse::<TransactionKind>().unwrap(), TransactionKind::Mint);
        assert_eq!("Burn".parse::<TransactionKind>().unwrap(), TransactionKind::Burn);
        assert!("transfer".parse::<TransactionKind>().is_err());
        assert!("deposit".parse::<TransactionKind>().is_err());
        assert!("withdraw".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_transaction_deserializes_numbers_and_strings() {
        let json = r#"{
            "tx_hash": "0xabc",
            "wallet": "0xwallet",
            "kind": "swap",
            "pair": {"token0": "WETH", "token1": "USDC"},
            "token0_delta": 1.5,
            "token1_delta": "-3000",
            "amount_usd": 3000,
            "timestamp": "2022-05-06T12:00:00Z"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, TransactionKind::Swap);
        assert_eq!(tx.token0_delta, dec!(1.5));
        assert_eq!(tx.token1_delta, dec!(-3000));
        assert_eq!(tx.gas_fee, Decimal::ZERO);
        assert_eq!(tx.legs()[1], ("USDC", dec!(-3000)));
    }

    #[test]
    fn test_cluster_label_serialization() {
        let noise = serde_json::to_string(&ClusterLabel::Noise).unwrap();
        assert_eq!(noise, "-1");
        let label: ClusterLabel = serde_json::from_str("3").unwrap();
        assert_eq!(label, ClusterLabel::Cluster(3));
        assert!(serde_json::from_str::<ClusterLabel>("-4").is_err());
    }
}
