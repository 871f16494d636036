//! Transactions command - the normalized feed as the engine sees it

use crate::cmd::{format_amount, format_quantity, FeedArgs};
use clap::Args;
use lotrecon::core::Transaction;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct TransactionsCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// Filter by symbol (e.g., BTCUSD)
    #[arg(long)]
    symbol: Option<String>,

    /// Output as CSV instead of formatted table
    #[arg(long)]
    csv: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct TransactionRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    /// Purchases only, fee included
    #[tabled(rename = "Unit Cost")]
    unit_cost: String,
    /// Disposals only, before fees
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Txn")]
    txn_id: String,
    #[tabled(rename = "Exchange")]
    exchange: String,
}

impl From<&Transaction> for TransactionRow {
    fn from(txn: &Transaction) -> Self {
        let c = txn.common();
        let (unit_cost, price, cost_basis, proceeds) = match txn {
            Transaction::Purchase(p) => (
                format_amount(p.common.cost_basis / p.common.quantity),
                String::new(),
                format_amount(p.common.cost_basis),
                String::new(),
            ),
            Transaction::Disposal(d) => (
                String::new(),
                format_amount(d.price),
                String::new(),
                format_amount(d.proceeds),
            ),
        };
        TransactionRow {
            date: c.date.to_rfc3339(),
            kind: txn.kind().to_string(),
            symbol: c.symbol.clone(),
            quantity: format_quantity(c.quantity),
            unit_cost,
            price,
            cost_basis,
            proceeds,
            txn_id: c.txn_id.clone(),
            exchange: c.exchange.clone(),
        }
    }
}

impl TransactionsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let loaded = self.feed.load()?;
        let rows: Vec<TransactionRow> = loaded
            .transactions
            .iter()
            .filter(|t| loaded.years.contains(t.common().date))
            .filter(|t| self.symbol.as_deref().is_none_or(|s| t.common().symbol == s))
            .map(TransactionRow::from)
            .collect();

        if self.csv {
            let mut wtr = csv::Writer::from_writer(io::stdout());
            for row in &rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
            return Ok(());
        }

        if rows.is_empty() {
            println!("No transactions found matching filters");
            return Ok(());
        }
        println!();
        println!("TRANSACTIONS ({})", loaded.years.display());
        println!();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        Ok(())
    }
}
