use super::transaction::{Disposal, DisposalStatus, Purchase};
use super::warnings::Warning;
use super::year::TaxYear;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Result of a reconciliation run: processed disposals, lots still open at
/// the end of the run, and lots that were fully consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReconciliationReport {
    pub disposals: Vec<Disposal>,
    pub open_purchases: Vec<Purchase>,
    pub disposed_purchases: Vec<Purchase>,
}

/// Counts and totals over a set of disposals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub disposal_count: usize,
    pub reconciled: usize,
    pub review_required: usize,
    pub underfunded: usize,
    pub total_proceeds: f64,
    pub total_cost_basis: f64,
    /// Proceeds less cost basis over the counted disposals
    pub total_realized_gain: f64,
    pub open_lots: usize,
    pub disposed_lots: usize,
}

impl ReconciliationReport {
    pub fn new(
        disposals: Vec<Disposal>,
        open_purchases: Vec<Purchase>,
        disposed_purchases: Vec<Purchase>,
    ) -> Self {
        ReconciliationReport {
            disposals,
            open_purchases,
            disposed_purchases,
        }
    }

    /// Disposals whose pool ran dry
    pub fn underfunded(&self) -> impl Iterator<Item = &Disposal> {
        self.with_status(DisposalStatus::Underfunded)
    }

    /// Disposals blocked by a later-dated lot
    pub fn review_required(&self) -> impl Iterator<Item = &Disposal> {
        self.with_status(DisposalStatus::ReviewRequired)
    }

    fn with_status(&self, status: DisposalStatus) -> impl Iterator<Item = &Disposal> {
        self.disposals.iter().filter(move |d| d.status == status)
    }

    /// One warning per underfunded or review-required disposal, in date order
    pub fn warnings(&self) -> Vec<Warning> {
        self.disposals.iter().filter_map(Warning::for_disposal).collect()
    }

    /// Open lots to seed the next period's run with
    pub fn carry_forward(&self) -> &[Purchase] {
        &self.open_purchases
    }

    pub fn summary(&self) -> ReportSummary {
        self.summarize(|_| true)
    }

    /// Summary restricted to disposals dated in `year`
    pub fn summary_for(&self, year: TaxYear) -> ReportSummary {
        self.summarize(|d| TaxYear::from_date(d.date()) == year)
    }

    fn summarize<F>(&self, include: F) -> ReportSummary
    where
        F: Fn(&Disposal) -> bool,
    {
        let mut summary = ReportSummary {
            open_lots: self.open_purchases.len(),
            disposed_lots: self.disposed_purchases.len(),
            ..ReportSummary::default()
        };
        for d in self.disposals.iter().filter(|d| include(d)) {
            summary.disposal_count += 1;
            summary.total_proceeds += d.proceeds;
            summary.total_cost_basis += d.common.cost_basis;
            summary.total_realized_gain += d.realized_gain();
            match d.status {
                DisposalStatus::Reconciled => summary.reconciled += 1,
                DisposalStatus::ReviewRequired => summary.review_required += 1,
                DisposalStatus::Underfunded => summary.underfunded += 1,
                DisposalStatus::Unmatched | DisposalStatus::Partial => {}
            }
        }
        summary
    }

    /// Tax years that have at least one disposal
    pub fn tax_years(&self) -> Vec<TaxYear> {
        let mut years: Vec<TaxYear> = self
            .disposals
            .iter()
            .map(|d| TaxYear::from_date(d.date()))
            .collect();
        years.sort();
        years.dedup();
        years
    }
}

/// Flat CSV row for a disposal (associated purchases omitted)
#[derive(Debug, Serialize, Deserialize)]
pub struct DisposalRow {
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub proceeds: f64,
    pub cost_basis: f64,
    pub realized_gain: f64,
    pub date: String,
    pub txn_id: String,
    pub exchange: String,
    pub quantity_reconciled: f64,
    pub review_required: bool,
    pub reconciled: bool,
    pub status: String,
    pub lots_matched: usize,
}

impl From<&Disposal> for DisposalRow {
    fn from(d: &Disposal) -> Self {
        DisposalRow {
            symbol: d.common.symbol.clone(),
            quantity: d.common.quantity,
            price: d.price,
            proceeds: d.proceeds,
            cost_basis: d.common.cost_basis,
            realized_gain: d.realized_gain(),
            date: d.common.date.to_rfc3339(),
            txn_id: d.common.txn_id.clone(),
            exchange: d.common.exchange.clone(),
            quantity_reconciled: d.quantity_reconciled,
            review_required: d.review_required,
            reconciled: d.reconciled,
            status: d.status.display().to_string(),
            lots_matched: d.associated_purchases.len(),
        }
    }
}

/// Flat CSV row for a purchase lot
#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseRow {
    pub symbol: String,
    pub quantity: f64,
    pub cost_basis: f64,
    pub date: String,
    pub txn_id: String,
    pub exchange: String,
    pub qty_disposed: f64,
    pub full_disposal: bool,
}

impl From<&Purchase> for PurchaseRow {
    fn from(p: &Purchase) -> Self {
        PurchaseRow {
            symbol: p.common.symbol.clone(),
            quantity: p.common.quantity,
            cost_basis: p.common.cost_basis,
            date: p.common.date.to_rfc3339(),
            txn_id: p.common.txn_id.clone(),
            exchange: p.common.exchange.clone(),
            qty_disposed: p.qty_disposed,
            full_disposal: p.full_disposal,
        }
    }
}

pub fn write_disposals_csv<W: Write>(disposals: &[Disposal], writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for disposal in disposals {
        wtr.serialize(DisposalRow::from(disposal))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_purchases_csv<W: Write>(purchases: &[Purchase], writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for purchase in purchases {
        wtr.serialize(PurchaseRow::from(purchase))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Nested JSON; disposals embed their associated purchase snapshots
pub fn write_json<W: Write, T: Serialize + ?Sized>(records: &T, writer: W) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}
