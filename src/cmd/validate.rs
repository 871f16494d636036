//! Validate command - report disposals that need attention without writing files

use crate::cmd::{format_amount, format_quantity, FeedArgs};
use clap::Args;
use lotrecon::core::Warning;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: String,
    date: String,
    exchange: String,
    txn_id: String,
    symbol: String,
    quantity: String,
    proceeds: String,
    message: String,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    years: String,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let years = self.feed.year_filter().display();
        let report = self.feed.load()?.reconcile()?;

        let issues: Vec<ValidationIssue> = report
            .disposals
            .iter()
            .filter_map(|d| Warning::for_disposal(d).map(|w| (d, w)))
            .map(|(d, w)| ValidationIssue {
                issue_type: w.type_name().to_string(),
                date: d.date().format("%Y-%m-%d").to_string(),
                exchange: d.common.exchange.clone(),
                txn_id: d.common.txn_id.clone(),
                symbol: d.symbol().to_string(),
                quantity: format_quantity(d.common.quantity),
                proceeds: format_amount(d.proceeds),
                message: w.message(),
            })
            .collect();

        if self.json {
            let output = ValidationOutput {
                years,
                issue_count: issues.len(),
                issues: issues.clone(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(&issues, &years);
        }

        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_text(issues: &[ValidationIssue], years: &str) {
    println!();
    println!("VALIDATION RESULTS ({})", years);
    println!();

    if issues.is_empty() {
        println!("\u{2713} No issues found.");
        return;
    }

    println!("\u{26A0} {} issue(s) found:", issues.len());
    println!();
    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}. [{}] {} {} {}: disposal of {} {} for {}",
            i + 1,
            issue.issue_type,
            issue.date,
            issue.exchange,
            issue.txn_id,
            issue.quantity,
            issue.symbol,
            issue.proceeds
        );
        println!("     {}", issue.message);
        println!();
    }
}
