//! Running holdings ledger for profitability estimation.
//!
//! Holdings start at zero and may go negative: the pipeline only sees pool
//! interactions, so tokens the wallet funded from elsewhere show up as a short
//! balance. Valuing signed holdings therefore yields the wallet's
//! mark-to-market PnL directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::{TokenPair, Transaction, TransactionKind};
use crate::pricing::PriceBook;

/// Ledger state valued right after one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Signed holdings plus pool positions, in USD
    pub valuation: Decimal,
    /// Long holdings plus pool positions, in USD
    pub exposure: Decimal,
}

#[derive(Debug, Default, Clone)]
struct PoolPosition {
    amount0: Decimal,
    amount1: Decimal,
}

#[derive(Debug, Default, Clone)]
pub struct HoldingsLedger {
    holdings: BTreeMap<String, Decimal>,
    pools: BTreeMap<TokenPair, PoolPosition>,
}

impl HoldingsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transaction and value the ledger at its timestamp.
    ///
    /// Returns `None` and leaves the ledger untouched when a token the
    /// transaction moves has no price reference at or before its timestamp,
    /// or when the resulting holdings cannot be valued without overflow.
    pub fn apply(&mut self, tx: &Transaction, book: &PriceBook) -> Option<LedgerSnapshot> {
        for (token, delta) in tx.legs() {
            if !delta.is_zero() && book.price_at(token, tx.timestamp).is_none() {
                tracing::debug!(
                    wallet = %tx.wallet,
                    tx_hash = %tx.tx_hash,
                    token = %token,
                    "No prior price reference, excluding transaction from ledger"
                );
                return None;
            }
        }

        let mut next = self.clone();
        let snapshot = next.stage(tx).and_then(|_| next.snapshot(tx.timestamp, book));
        match snapshot {
            Some(snapshot) => {
                *self = next;
                Some(snapshot)
            }
            None => {
                tracing::debug!(
                    wallet = %tx.wallet,
                    tx_hash = %tx.tx_hash,
                    "Valuation overflowed, excluding transaction from ledger"
                );
                None
            }
        }
    }

    fn stage(&mut self, tx: &Transaction) -> Option<()> {
        for (token, delta) in tx.legs() {
            let held = self.holdings.entry(token.to_string()).or_default();
            *held = held.checked_add(delta)?;
        }

        match tx.kind {
            TransactionKind::Swap => {}
            TransactionKind::Mint | TransactionKind::Burn => {
                // Mint deltas are negative so the pool grows; burns drain it but
                // never below zero, leaving any excess (fees) in holdings.
                let position = self.pools.entry(tx.pair.clone()).or_default();
                position.amount0 =
                    position.amount0.checked_sub(tx.token0_delta)?.max(Decimal::ZERO);
                position.amount1 =
                    position.amount1.checked_sub(tx.token1_delta)?.max(Decimal::ZERO);
            }
        }

        Some(())
    }

    fn snapshot(&self, at: DateTime<Utc>, book: &PriceBook) -> Option<LedgerSnapshot> {
        let price = |token: &str| book.price_at(token, at).unwrap_or(Decimal::ZERO);

        let mut valuation = Decimal::ZERO;
        let mut exposure = Decimal::ZERO;

        for (token, amount) in &self.holdings {
            let value = amount.checked_mul(price(token.as_str()))?;
            valuation = valuation.checked_add(value)?;
            if value > Decimal::ZERO {
                exposure = exposure.checked_add(value)?;
            }
        }

        for (pair, position) in &self.pools {
            let value = position
                .amount0
                .checked_mul(price(pair.token0.as_str()))?
                .checked_add(position.amount1.checked_mul(price(pair.token1.as_str()))?)?;
            valuation = valuation.checked_add(value)?;
            exposure = exposure.checked_add(value)?;
        }

        Some(LedgerSnapshot {
            timestamp: at,
            valuation,
            exposure,
        })
    }

    pub fn holding(&self, token: &str) -> Decimal {
        self.holdings.get(token).copied().unwrap_or_default()
    }
}

/// Cumulative profitability derived from a wallet's ledger snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitabilityEstimate {
    pub cumulative_pnl_usd: f64,
    pub time_weighted_exposure_usd: f64,
    pub profitability_ratio: Option<f64>,
}

impl ProfitabilityEstimate {
    /// Fold time-ordered snapshots into a profitability estimate.
    ///
    /// Each snapshot's exposure is held until the next snapshot. When all
    /// snapshots share one timestamp the plain mean is used instead. Time
    /// weighting runs in `f64`; exposure times seconds can exceed `Decimal`.
    pub fn from_snapshots(snapshots: &[LedgerSnapshot]) -> Option<Self> {
        let last = snapshots.last()?;
        let first = snapshots.first()?;
        let exposure = |s: &LedgerSnapshot| s.exposure.to_f64().unwrap_or_default();

        let span = (last.timestamp - first.timestamp).num_seconds();
        let weighted_exposure = if span <= 0 {
            snapshots.iter().map(exposure).sum::<f64>() / snapshots.len() as f64
        } else {
            let weighted: f64 = snapshots
                .windows(2)
                .map(|w| {
                    let held = (w[1].timestamp - w[0].timestamp).num_seconds();
                    exposure(&w[0]) * held as f64
                })
                .sum();
            weighted / span as f64
        };

        let cumulative_pnl_usd = last.valuation.to_f64().unwrap_or_default();
        let profitability_ratio = if weighted_exposure > 0.0 && weighted_exposure.is_finite() {
            Some(cumulative_pnl_usd / weighted_exposure)
        } else {
            None
        };

        Some(Self {
            cumulative_pnl_usd,
            time_weighted_exposure_usd: weighted_exposure,
            profitability_ratio,
        })
    }
}
