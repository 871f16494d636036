use chrono::{DateTime, Datelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Relative tolerance for the `>=` comparisons that decide whether a lot is
/// fully disposed or a disposal fully reconciled. Scaled by the quantity so
/// dust-sized quantities are never treated as already done.
pub const QTY_TOLERANCE: f64 = 1e-9;

/// `done` covers `total` up to the quantity-scaled tolerance
fn covers(done: f64, total: f64) -> bool {
    done > 0.0 && done >= total - QTY_TOLERANCE * total.abs()
}

/// Fields shared by purchases and disposals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TxnCommon {
    /// Normalized symbol, e.g. "BTCUSD"
    pub symbol: String,
    /// Always positive
    pub quantity: f64,
    pub date: DateTime<Utc>,
    /// Identifier unique within `exchange`
    pub txn_id: String,
    pub exchange: String,
    /// Purchase: price * quantity + fee. Disposal: apportioned lot cost.
    pub cost_basis: f64,
}

impl TxnCommon {
    /// Calendar year of the transaction date
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Ordering used everywhere lots or disposals are sorted: date first,
    /// then txn_id and exchange so identical timestamps sort reproducibly.
    pub fn fifo_cmp(&self, other: &TxnCommon) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.txn_id.cmp(&other.txn_id))
            .then_with(|| self.exchange.cmp(&other.exchange))
    }
}

/// An acquisition lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Purchase {
    #[serde(flatten)]
    pub common: TxnCommon,
    /// Running total consumed by disposals
    #[serde(default)]
    pub qty_disposed: f64,
    #[serde(default)]
    pub full_disposal: bool,
}

impl Purchase {
    pub fn new(common: TxnCommon) -> Self {
        Purchase {
            common,
            qty_disposed: 0.0,
            full_disposal: false,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.common.symbol
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.common.date
    }

    pub fn remaining(&self) -> f64 {
        (self.common.quantity - self.qty_disposed).max(0.0)
    }

    /// Recompute `full_disposal`, snapping `qty_disposed` to `quantity`
    /// once the remainder is within tolerance.
    pub fn refresh_full_disposal(&mut self) {
        self.full_disposal = covers(self.qty_disposed, self.common.quantity);
        if self.full_disposal {
            self.qty_disposed = self.common.quantity;
        }
    }
}

/// Where a disposal is in its matching lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum DisposalStatus {
    #[default]
    Unmatched,
    /// At least one lot contributed, matching still in progress
    Partial,
    Reconciled,
    /// Blocked by a lot dated after the disposal
    ReviewRequired,
    /// Pool exhausted before the disposal was covered
    Underfunded,
}

impl DisposalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DisposalStatus::Reconciled | DisposalStatus::ReviewRequired | DisposalStatus::Underfunded
        )
    }

    pub fn display(self) -> &'static str {
        match self {
            DisposalStatus::Unmatched => "Unmatched",
            DisposalStatus::Partial => "Partial",
            DisposalStatus::Reconciled => "Reconciled",
            DisposalStatus::ReviewRequired => "ReviewRequired",
            DisposalStatus::Underfunded => "Underfunded",
        }
    }
}

impl std::fmt::Display for DisposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Snapshot of a lot taken straight after it funded part of a disposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssociatedPurchase {
    #[serde(flatten)]
    pub purchase: Purchase,
    /// Quantity this lot contributed to the disposal
    pub qty_consumed: f64,
    /// `lot.cost_basis * qty_consumed / disposal.quantity`
    pub cost_contribution: f64,
}

/// A sale or other disposition matched against purchase lots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Disposal {
    #[serde(flatten)]
    pub common: TxnCommon,
    pub price: f64,
    /// price * quantity - fee
    pub proceeds: f64,
    #[serde(default)]
    pub quantity_reconciled: f64,
    #[serde(default)]
    pub review_required: bool,
    #[serde(default)]
    pub reconciled: bool,
    #[serde(default)]
    pub status: DisposalStatus,
    /// Consumption order
    #[serde(default)]
    pub associated_purchases: Vec<AssociatedPurchase>,
}

impl Disposal {
    /// Cost basis always starts at zero and accumulates lot contributions.
    pub fn new(mut common: TxnCommon, price: f64, proceeds: f64) -> Self {
        common.cost_basis = 0.0;
        Disposal {
            common,
            price,
            proceeds,
            quantity_reconciled: 0.0,
            review_required: false,
            reconciled: false,
            status: DisposalStatus::Unmatched,
            associated_purchases: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.common.symbol
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.common.date
    }

    pub fn remaining(&self) -> f64 {
        (self.common.quantity - self.quantity_reconciled).max(0.0)
    }

    /// True once `quantity_reconciled` is within tolerance of `quantity`.
    /// Also snaps `quantity_reconciled` and sets `reconciled`.
    pub fn refresh_reconciled(&mut self) -> bool {
        self.reconciled = covers(self.quantity_reconciled, self.common.quantity);
        if self.reconciled {
            self.quantity_reconciled = self.common.quantity;
        }
        self.reconciled
    }

    /// Quantity left uncovered by any lot
    pub fn unreconciled(&self) -> f64 {
        self.remaining()
    }

    pub fn realized_gain(&self) -> f64 {
        self.proceeds - self.common.cost_basis
    }
}

/// A normalized transaction. Kind-specific matching is done with an explicit
/// `match` on this tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum Transaction {
    Purchase(Purchase),
    Disposal(Disposal),
}

impl Transaction {
    pub fn common(&self) -> &TxnCommon {
        match self {
            Transaction::Purchase(p) => &p.common,
            Transaction::Disposal(d) => &d.common,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::Purchase(_) => "Purchase",
            Transaction::Disposal(_) => "Disposal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn common(symbol: &str, qty: f64, cost: f64) -> TxnCommon {
        TxnCommon {
            symbol: symbol.to_string(),
            quantity: qty,
            date: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
            txn_id: "tx-1".to_string(),
            exchange: "Coinbase Pro".to_string(),
            cost_basis: cost,
        }
    }

    #[test]
    fn full_disposal_snaps_within_tolerance() {
        let mut lot = Purchase::new(common("BTCUSD", 1.0, 100.0));
        lot.qty_disposed = 0.3 + 0.3 + 0.4 - 1e-12;
        lot.refresh_full_disposal();
        assert!(lot.full_disposal);
        assert_eq!(lot.qty_disposed, 1.0);
        assert_eq!(lot.remaining(), 0.0);
    }

    #[test]
    fn dust_quantities_are_not_done_before_matching() {
        let mut lot = Purchase::new(common("BTCUSD", 5e-10, 1.0));
        lot.refresh_full_disposal();
        assert!(!lot.full_disposal);
        assert_eq!(lot.remaining(), 5e-10);

        let mut disposal = Disposal::new(common("BTCUSD", 5e-10, 0.0), 1.0, 1.0);
        assert!(!disposal.refresh_reconciled());
        assert_eq!(disposal.quantity_reconciled, 0.0);

        disposal.quantity_reconciled = 5e-10;
        assert!(disposal.refresh_reconciled());
    }

    #[test]
    fn tolerance_scales_with_quantity() {
        let mut lot = Purchase::new(common("BTCUSD", 1e6, 1.0));
        lot.qty_disposed = 1e6 - 1e-4;
        lot.refresh_full_disposal();
        assert!(lot.full_disposal);
        assert_eq!(lot.qty_disposed, 1e6);

        let mut lot = Purchase::new(common("BTCUSD", 1e-6, 1.0));
        lot.qty_disposed = 1e-6 - 1e-12;
        lot.refresh_full_disposal();
        assert!(!lot.full_disposal);
    }

    #[test]
    fn partial_lot_is_not_fully_disposed() {
        let mut lot = Purchase::new(common("BTCUSD", 1.0, 100.0));
        lot.qty_disposed = 0.5;
        lot.refresh_full_disposal();
        assert!(!lot.full_disposal);
        assert_eq!(lot.remaining(), 0.5);
    }

    #[test]
    fn new_disposal_starts_with_zero_cost_basis() {
        let disposal = Disposal::new(common("BTCUSD", 1.5, 999.0), 20000.0, 30000.0);
        assert_eq!(disposal.common.cost_basis, 0.0);
        assert_eq!(disposal.status, DisposalStatus::Unmatched);
        assert!(!disposal.reconciled);
        assert_eq!(disposal.remaining(), 1.5);
    }

    #[test]
    fn realized_gain_is_proceeds_less_cost_basis() {
        let mut disposal = Disposal::new(common("BTCUSD", 1.0, 0.0), 30000.0, 29990.0);
        disposal.common.cost_basis = 20000.0;
        assert_eq!(disposal.realized_gain(), 9990.0);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!DisposalStatus::Unmatched.is_terminal());
        assert!(!DisposalStatus::Partial.is_terminal());
        assert!(DisposalStatus::Reconciled.is_terminal());
        assert!(DisposalStatus::ReviewRequired.is_terminal());
        assert!(DisposalStatus::Underfunded.is_terminal());
    }

    #[test]
    fn fifo_cmp_breaks_date_ties_by_txn_id() {
        let a = common("BTCUSD", 1.0, 1.0);
        let mut b = a.clone();
        b.txn_id = "tx-0".to_string();
        assert_eq!(a.fifo_cmp(&b), Ordering::Greater);
        assert_eq!(b.fifo_cmp(&a), Ordering::Less);
    }

    #[test]
    fn purchase_json_is_flat() {
        let lot = Purchase::new(common("BTCUSD", 1.0, 100.0));
        let json = serde_json::to_value(&lot).unwrap();
        assert_eq!(json["symbol"], "BTCUSD");
        assert_eq!(json["qty_disposed"], 0.0);
        assert_eq!(json["full_disposal"], false);
        assert!(json.get("common").is_none());
    }

    #[test]
    fn transaction_is_tagged_by_kind() {
        let txn = Transaction::Purchase(Purchase::new(common("BTCUSD", 1.0, 100.0)));
        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["kind"], "Purchase");
        assert_eq!(txn.kind(), "Purchase");
        assert_eq!(txn.common().symbol, "BTCUSD");
    }
}
