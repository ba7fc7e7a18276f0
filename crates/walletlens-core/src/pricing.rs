//! Token price references
//!
//! Prices are learned from swaps: a swap worth `amount_usd` that moved
//! `|delta|` units of a token implies a unit price of `amount_usd / |delta|`
//! at that instant. Stable tokens are pinned to 1 USD.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Transaction, TransactionKind};

/// Stable tokens recognised when no list is configured
pub const DEFAULT_STABLE_TOKENS: &[&str] =
    &["USDC", "USDT", "DAI", "BUSD", "TUSD", "USDP", "FRAX", "LUSD"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub timestamp: DateTime<Utc>,
    pub price_usd: Decimal,
}

/// Time-indexed per-token USD prices.
///
/// Read-only once built; every wallet aggregation shares the same book.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    observations: HashMap<String, Vec<PriceObservation>>,
    stable_tokens: HashSet<String>,
}

impl PriceBook {
    pub fn new<I, S>(stable_tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            observations: HashMap::new(),
            stable_tokens: stable_tokens
                .into_iter()
                .map(|t| t.as_ref().to_uppercase())
                .collect(),
        }
    }

    /// Build a book from every swap in `transactions`.
    ///
    /// Swaps are replayed in `(timestamp, tx_hash)` order so observations that
    /// share a timestamp resolve the same way regardless of input order.
    pub fn from_transactions<I, S>(transactions: &[Transaction], stable_tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut book = Self::new(stable_tokens);

        let mut swaps: Vec<&Transaction> = transactions
            .iter()
            .filter(|tx| tx.kind == TransactionKind::Swap && tx.amount_usd > Decimal::ZERO)
            .collect();
        swaps.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

        for tx in swaps {
            for (token, delta) in tx.legs() {
                if delta.is_zero() || book.is_stable(token) {
                    continue;
                }
                if let Some(price) = tx.amount_usd.checked_div(delta.abs()) {
                    book.observations
                        .entry(token.to_string())
                        .or_default()
                        .push(PriceObservation {
                            timestamp: tx.timestamp,
                            price_usd: price,
                        });
                }
            }
        }

        tracing::debug!(
            tokens = book.observations.len(),
            observations = book.observation_count(),
            stable_tokens = book.stable_tokens.len(),
            "Price book built from swaps"
        );

        book
    }

    /// Seed an external price. Later inserts win over earlier ones at the same timestamp.
    pub fn insert(&mut self, token: &str, timestamp: DateTime<Utc>, price_usd: Decimal) {
        let series = self.observations.entry(token.to_string()).or_default();
        let idx = series.partition_point(|o| o.timestamp <= timestamp);
        series.insert(idx, PriceObservation { timestamp, price_usd });
    }

    pub fn is_stable(&self, token: &str) -> bool {
        self.stable_tokens.contains(&token.to_uppercase())
    }

    /// Latest price at or before `at`, or `None` when the token has no prior reference
    pub fn price_at(&self, token: &str, at: DateTime<Utc>) -> Option<Decimal> {
        if self.is_stable(token) {
            return Some(Decimal::ONE);
        }

        let series = self.observations.get(token)?;
        let idx = series.partition_point(|o| o.timestamp <= at);
        if idx == 0 {
            None
        } else {
            Some(series[idx - 1].price_usd)
        }
    }

    /// Coefficient of variation of a token's observed prices.
    ///
    /// Stable tokens have zero volatility. Tokens with fewer than two
    /// observations return `None`.
    pub fn volatility(&self, token: &str) -> Option<f64> {
        if self.is_stable(token) {
            return Some(0.0);
        }

        let prices: Vec<f64> = self
            .observations
            .get(token)?
            .iter()
            .filter_map(|o| o.price_usd.to_f64())
            .collect();

        if prices.len() < 2 {
            return None;
        }

        let n = prices.len() as f64;
        let mean = prices.iter().sum::<f64>() / n;
        if mean <= 0.0 {
            return None;
        }
        let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;

        Some(variance.sqrt() / mean)
    }

    pub fn observation_count(&self) -> usize {
        self.observations.values().map(Vec::len).sum()
    }
}
