//! Pools command - lots left open (or consumed) after reconciliation

use crate::cmd::{format_amount, format_quantity, FeedArgs};
use clap::Args;
use lotrecon::core::Purchase;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct PoolsCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// Filter by symbol (e.g., BTCUSD)
    #[arg(long)]
    symbol: Option<String>,

    /// Show fully disposed lots instead of open ones
    #[arg(long)]
    disposed: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct LotRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Exchange")]
    exchange: String,
    #[tabled(rename = "Txn")]
    txn_id: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Disposed")]
    disposed: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
}

#[derive(Debug, Serialize)]
struct SymbolTotal {
    symbol: String,
    lots: usize,
    remaining: f64,
    cost_basis: f64,
}

#[derive(Debug, Serialize)]
struct PoolsOutput<'a> {
    years: String,
    lots: Vec<&'a Purchase>,
    totals: Vec<SymbolTotal>,
}

impl PoolsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let years = self.feed.year_filter().display();
        let report = self.feed.load()?.reconcile()?;

        let source = if self.disposed {
            &report.disposed_purchases
        } else {
            &report.open_purchases
        };
        let lots: Vec<&Purchase> = source
            .iter()
            .filter(|p| self.symbol.as_deref().is_none_or(|s| p.symbol() == s))
            .collect();

        if self.json {
            let output = PoolsOutput {
                years,
                totals: totals(&lots),
                lots,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            self.print_table(&lots, &years);
        }
        Ok(())
    }

    fn print_table(&self, lots: &[&Purchase], years: &str) {
        let label = if self.disposed { "DISPOSED LOTS" } else { "OPEN LOTS" };
        if lots.is_empty() {
            println!("No lots found matching filters ({})", years);
            return;
        }

        println!();
        println!("{} ({})", label, years);
        println!();

        let rows: Vec<LotRow> = lots
            .iter()
            .map(|p| LotRow {
                date: p.date().format("%Y-%m-%d").to_string(),
                symbol: p.symbol().to_string(),
                exchange: p.common.exchange.clone(),
                txn_id: p.common.txn_id.clone(),
                quantity: format_quantity(p.common.quantity),
                disposed: format_quantity(p.qty_disposed),
                remaining: format_quantity(p.remaining()),
                cost_basis: format_amount(p.common.cost_basis),
            })
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        println!();

        for total in totals(lots) {
            println!(
                "  {}: {} lot(s), {} remaining, cost basis {}",
                total.symbol,
                total.lots,
                format_quantity(total.remaining),
                format_amount(total.cost_basis)
            );
        }
    }
}

/// Per-symbol totals, in symbol order
fn totals(lots: &[&Purchase]) -> Vec<SymbolTotal> {
    let mut totals: Vec<SymbolTotal> = Vec::new();
    for lot in lots {
        match totals.iter_mut().find(|t| t.symbol == lot.symbol()) {
            Some(t) => {
                t.lots += 1;
                t.remaining += lot.remaining();
                t.cost_basis += lot.common.cost_basis;
            }
            None => totals.push(SymbolTotal {
                symbol: lot.symbol().to_string(),
                lots: 1,
                remaining: lot.remaining(),
                cost_basis: lot.common.cost_basis,
            }),
        }
    }
    totals.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    totals
}
