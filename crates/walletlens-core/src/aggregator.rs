//! Wallet feature aggregation
//!
//! Folds each wallet's transactions, sorted by `(timestamp, tx_hash)`, into a
//! [`WalletFeatureVector`]. Input order never affects the result.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{LensError, LensResult};
use crate::ledger::{HoldingsLedger, ProfitabilityEstimate};
use crate::models::{Transaction, TransactionKind, WalletFeatureVector};
use crate::pricing::PriceBook;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Compute the feature vector of one wallet.
///
/// Every transaction must belong to `wallet`.
pub fn aggregate_wallet<'a, I>(
    wallet: &str,
    transactions: I,
    book: &PriceBook,
) -> LensResult<WalletFeatureVector>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut txs: Vec<&Transaction> = transactions.into_iter().collect();
    if txs.is_empty() {
        return Err(LensError::InsufficientData(format!(
            "wallet {} has no transactions",
            wallet
        )));
    }
    if let Some(foreign) = txs.iter().find(|tx| tx.wallet != wallet) {
        return Err(LensError::InvalidConfig(format!(
            "transaction {} belongs to wallet {}, not {}",
            foreign.tx_hash, foreign.wallet, wallet
        )));
    }
    txs.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

    let total = txs.len() as u64;
    let count_kind =
        |kind: TransactionKind| txs.iter().filter(|tx| tx.kind == kind).count() as u64;

    let mut tokens: BTreeSet<&str> = BTreeSet::new();
    let mut stable_legs = 0u64;
    for tx in &txs {
        for (token, _) in tx.legs() {
            tokens.insert(token);
            if book.is_stable(token) {
                stable_legs += 1;
            }
        }
    }

    let total_volume_usd = sum_f64(txs.iter().map(|tx| tx.amount_usd));
    let total_gas = sum_f64(txs.iter().map(|tx| tx.gas_fee));

    let active_days = txs
        .iter()
        .map(|tx| tx.timestamp.date_naive())
        .collect::<BTreeSet<_>>()
        .len() as u64;

    let first = txs[0].timestamp;
    let last = txs[txs.len() - 1].timestamp;

    let (estimate, unpriced_tx_count) = profitability(&txs, book);

    let features = WalletFeatureVector {
        wallet: wallet.to_string(),
        mint_count: count_kind(TransactionKind::Mint),
        burn_count: count_kind(TransactionKind::Burn),
        swap_count: count_kind(TransactionKind::Swap),
        total_count: total,
        distinct_token_count: tokens.len() as u64,
        stable_token_ratio: stable_legs as f64 / (2 * total) as f64,
        interval_regularity: interval_regularity(&txs),
        avg_gas_fee: total_gas / total as f64,
        total_volume_usd,
        avg_trade_usd: total_volume_usd / total as f64,
        active_days,
        tx_per_active_day: total as f64 / active_days as f64,
        active_span_days: (last - first).num_seconds() as f64 / SECONDS_PER_DAY,
        price_volatility_exposure: volatility_exposure(&txs, book),
        cumulative_pnl_usd: estimate.as_ref().map(|e| e.cumulative_pnl_usd),
        time_weighted_exposure_usd: estimate.as_ref().map(|e| e.time_weighted_exposure_usd),
        profitability_ratio: estimate.as_ref().and_then(|e| e.profitability_ratio),
        unpriced_tx_count,
    };

    tracing::debug!(
        wallet = %wallet,
        transactions = total,
        unpriced = unpriced_tx_count,
        pnl = ?features.cumulative_pnl_usd,
        "Wallet features computed"
    );

    Ok(features)
}

/// Group transactions by wallet and compute every wallet's features.
///
/// Output holds one vector per distinct wallet, ordered by wallet id.
pub fn aggregate_all(
    transactions: &[Transaction],
    book: &PriceBook,
) -> LensResult<Vec<WalletFeatureVector>> {
    let mut by_wallet: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        by_wallet.entry(tx.wallet.as_str()).or_default().push(tx);
    }

    let mut features = Vec::with_capacity(by_wallet.len());
    for (wallet, txs) in by_wallet {
        features.push(aggregate_wallet(wallet, txs, book)?);
    }

    tracing::info!(
        transactions = transactions.len(),
        wallets = features.len(),
        "Aggregated wallet features"
    );

    Ok(features)
}

/// Exact `Decimal` sum, falling back to an `f64` sum if it overflows
fn sum_f64(values: impl Iterator<Item = Decimal> + Clone) -> f64 {
    values
        .clone()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .and_then(|total| total.to_f64())
        .unwrap_or_else(|| values.filter_map(|v| v.to_f64()).sum())
}

fn profitability(txs: &[&Transaction], book: &PriceBook) -> (Option<ProfitabilityEstimate>, u64) {
    let mut ledger = HoldingsLedger::new();
    let mut snapshots = Vec::with_capacity(txs.len());
    let mut unpriced = 0u64;

    for tx in txs {
        match ledger.apply(tx, book) {
            Some(snapshot) => snapshots.push(snapshot),
            None => unpriced += 1,
        }
    }

    (ProfitabilityEstimate::from_snapshots(&snapshots), unpriced)
}

/// `1 / (1 + cv)` of the gaps between consecutive transactions.
///
/// Needs at least two gaps; fewer yields 0. Gaps that are all zero count as
/// perfectly regular.
fn interval_regularity(txs: &[&Transaction]) -> f64 {
    let gaps: Vec<f64> = txs
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .collect();

    if gaps.len() < 2 {
        return 0.0;
    }

    let n = gaps.len() as f64;
    let mean = gaps.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 1.0;
    }
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n;
    let cv = variance.sqrt() / mean;

    1.0 / (1.0 + cv)
}

/// USD-weighted average price volatility of the tokens a wallet touched
fn volatility_exposure(txs: &[&Transaction], book: &PriceBook) -> f64 {
    let mut weighted = 0.0;
    let mut weight = 0.0;

    for tx in txs {
        let usd = tx.amount_usd.to_f64().unwrap_or_default();
        for (token, _) in tx.legs() {
            if let Some(vol) = book.volatility(token) {
                weighted += usd * vol;
                weight += usd;
            }
        }
    }

    if weight > 0.0 {
        weighted / weight
    } else {
        0.0
    }
}
