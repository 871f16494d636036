//! Batch driver - one full reconciliation run over a transaction list

use super::error::{ConfigurationError, FeedError};
use super::matching::match_disposal;
use super::pool::LotPool;
use super::report::ReconciliationReport;
use super::transaction::{Disposal, DisposalStatus, Purchase, Transaction, TxnCommon, QTY_TOLERANCE};
use super::year::YearFilter;
use std::collections::HashSet;

/// Reconcile every disposal in `transactions` against FIFO purchase lots.
///
/// The feed and the carry-forward lots are validated up front; any problem
/// fails the whole run before a single lot is touched. Transactions outside
/// `years` are dropped (carry-forward lots are never year filtered), the pool
/// is seeded with the remaining purchases plus carry-forward lots, and then
/// each disposal is matched in ascending date order. Disposals that end up
/// underfunded or blocked for review stay in the report with their status.
pub fn reconcile(
    transactions: Vec<Transaction>,
    carry_forward: Vec<Purchase>,
    years: &YearFilter,
) -> Result<ReconciliationReport, FeedError> {
    validate_transactions(&transactions)?;
    validate_carry_forward(&carry_forward, &transactions)?;

    let (purchases, mut disposals) = partition(transactions, years);
    log::info!(
        "Reconciling {} purchases and {} disposals for {} ({} carry-forward lots)",
        purchases.len(),
        disposals.len(),
        years.display(),
        carry_forward.len()
    );

    let purchases = merge_carry_forward(purchases, carry_forward);
    disposals.sort_by(|a, b| a.common.fifo_cmp(&b.common));

    let mut pool = LotPool::new();
    pool.seed(purchases);

    for disposal in disposals.iter_mut() {
        match match_disposal(disposal, &mut pool) {
            DisposalStatus::Underfunded => log::warn!(
                "Disposal {} of {} {} on {} underfunded: {} of {} unreconciled",
                disposal.common.txn_id,
                disposal.common.quantity,
                disposal.symbol(),
                disposal.date(),
                disposal.unreconciled(),
                disposal.common.quantity
            ),
            DisposalStatus::ReviewRequired => log::warn!(
                "Disposal {} of {} {} on {} requires review: next lot is dated later",
                disposal.common.txn_id,
                disposal.common.quantity,
                disposal.symbol(),
                disposal.date()
            ),
            _ => {}
        }
    }

    let (open, disposed) = pool.into_parts();
    let report = ReconciliationReport::new(disposals, open, disposed);
    log::info!(
        "Reconciliation complete: {} open lots, {} disposed lots, {} warnings",
        report.open_purchases.len(),
        report.disposed_purchases.len(),
        report.warnings().len()
    );
    Ok(report)
}

/// Split by kind, keeping only transactions dated in `years`, each side
/// sorted into FIFO order.
fn partition(transactions: Vec<Transaction>, years: &YearFilter) -> (Vec<Purchase>, Vec<Disposal>) {
    let mut purchases = Vec::new();
    let mut disposals = Vec::new();

    for txn in transactions {
        if !years.contains(txn.common().date) {
            continue;
        }
        match txn {
            Transaction::Purchase(p) => purchases.push(p),
            Transaction::Disposal(d) => disposals.push(d),
        }
    }

    purchases.sort_by(|a, b| a.common.fifo_cmp(&b.common));
    disposals.sort_by(|a, b| a.common.fifo_cmp(&b.common));
    (purchases, disposals)
}

/// Carry-forward lots already hold prior consumption, so they replace any
/// feed purchase with the same exchange and txn_id.
fn merge_carry_forward(purchases: Vec<Purchase>, carry_forward: Vec<Purchase>) -> Vec<Purchase> {
    let carried: HashSet<(String, String)> = carry_forward
        .iter()
        .map(|p| (p.common.exchange.clone(), p.common.txn_id.clone()))
        .collect();

    let mut merged: Vec<Purchase> = purchases
        .into_iter()
        .filter(|p| {
            let key = (p.common.exchange.clone(), p.common.txn_id.clone());
            let duplicate = carried.contains(&key);
            if duplicate {
                log::warn!(
                    "Purchase {} on {} is also a carry-forward lot, using the carry-forward state",
                    p.common.txn_id,
                    p.common.exchange
                );
            }
            !duplicate
        })
        .collect();
    merged.extend(carry_forward);
    merged
}

fn validate_transactions(transactions: &[Transaction]) -> Result<(), FeedError> {
    let mut seen = HashSet::new();
    for txn in transactions {
        let common = txn.common();
        validate_common(common)?;
        if let Transaction::Disposal(d) = txn {
            require_finite(common, "price", d.price)?;
            require_finite(common, "proceeds", d.proceeds)?;
        }
        if !seen.insert((common.exchange.as_str(), common.txn_id.as_str())) {
            return Err(FeedError::DuplicateTransactionId {
                exchange: common.exchange.clone(),
                txn_id: common.txn_id.clone(),
            });
        }
    }
    Ok(())
}

/// Carry-forward lots may repeat a feed purchase (the carried state wins) but
/// never a feed disposal.
fn validate_carry_forward(lots: &[Purchase], transactions: &[Transaction]) -> Result<(), FeedError> {
    let disposal_ids: HashSet<(&str, &str)> = transactions
        .iter()
        .filter_map(|txn| match txn {
            Transaction::Disposal(d) => Some((d.common.exchange.as_str(), d.common.txn_id.as_str())),
            Transaction::Purchase(_) => None,
        })
        .collect();
    let mut seen = HashSet::new();
    for lot in lots {
        validate_common(&lot.common)?;
        require_finite(&lot.common, "qty_disposed", lot.qty_disposed)?;
        if lot.qty_disposed < 0.0 || lot.qty_disposed > lot.common.quantity * (1.0 + QTY_TOLERANCE) {
            return Err(FeedError::InvalidCarryForward {
                txn_id: lot.common.txn_id.clone(),
                reason: format!(
                    "qty_disposed {} outside 0..={}",
                    lot.qty_disposed, lot.common.quantity
                ),
            });
        }
        let key = (lot.common.exchange.as_str(), lot.common.txn_id.as_str());
        if disposal_ids.contains(&key) {
            return Err(FeedError::InvalidCarryForward {
                txn_id: lot.common.txn_id.clone(),
                reason: format!("id is also a disposal on {}", lot.common.exchange),
            });
        }
        if !seen.insert(key) {
            return Err(FeedError::DuplicateTransactionId {
                exchange: lot.common.exchange.clone(),
                txn_id: lot.common.txn_id.clone(),
            });
        }
    }
    Ok(())
}

fn validate_common(common: &TxnCommon) -> Result<(), FeedError> {
    if common.exchange.trim().is_empty() {
        return Err(ConfigurationError::MissingExchange.into());
    }
    if common.txn_id.trim().is_empty() {
        return Err(FeedError::MissingTransactionId {
            exchange: common.exchange.clone(),
        });
    }
    if !is_normalized_symbol(&common.symbol) {
        return Err(FeedError::UnnormalizedSymbol {
            txn_id: common.txn_id.clone(),
            symbol: common.symbol.clone(),
        });
    }
    if !common.quantity.is_finite() || common.quantity <= 0.0 {
        return Err(FeedError::InvalidQuantity {
            txn_id: common.txn_id.clone(),
            quantity: common.quantity,
        });
    }
    require_finite(common, "cost_basis", common.cost_basis)
}

fn require_finite(common: &TxnCommon, field: &str, value: f64) -> Result<(), FeedError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FeedError::NonFiniteAmount {
            txn_id: common.txn_id.clone(),
            field: field.to_string(),
        })
    }
}

/// Normalized symbols carry no venue separators, e.g. "BTCUSD" not "BTC-USD"
pub fn is_normalized_symbol(symbol: &str) -> bool {
    !symbol.is_empty() && !symbol.chars().any(|c| c == '-' || c == '/' || c.is_whitespace())
}
