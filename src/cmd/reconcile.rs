//! Reconcile command - match disposals to lots and write the report files

use crate::cmd::{format_amount, format_quantity, FeedArgs, InputDigest};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, ValueEnum};
use lotrecon::core::{
    write_disposals_csv, write_json, write_purchases_csv, ReconciliationReport, ReportSummary,
    Warning,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReconcileCommand {
    #[command(flatten)]
    feed: FeedArgs,

    /// Directory the report files are written to
    #[arg(short, long, default_value = "data")]
    out_dir: PathBuf,

    /// Which report formats to write
    #[arg(long, value_enum, default_value_t = OutputFormat::Both)]
    format: OutputFormat,

    /// Date stamped into the file names (defaults to today, UTC)
    #[arg(long)]
    run_date: Option<NaiveDate>,

    /// Print the summary as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
    Both,
}

impl OutputFormat {
    fn json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }

    fn csv(self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }
}

/// Record of one run, written next to the report files
#[derive(Debug, Serialize)]
struct Manifest {
    run_date: String,
    years: Vec<i32>,
    inputs: Vec<InputDigest>,
    sha256: String,
    summary: ReportSummary,
    by_year: Vec<YearSummary>,
    warnings: Vec<Warning>,
    files: Vec<String>,
}

/// Summary of the disposals dated in one calendar year
#[derive(Debug, Serialize)]
struct YearSummary {
    year: i32,
    summary: ReportSummary,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Year")]
    year: String,
    #[tabled(rename = "Disposals")]
    disposals: usize,
    #[tabled(rename = "Reconciled")]
    reconciled: usize,
    #[tabled(rename = "Review")]
    review_required: usize,
    #[tabled(rename = "Underfunded")]
    underfunded: usize,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
    #[tabled(rename = "Gain/Loss")]
    gain: String,
    #[tabled(rename = "Open Lots")]
    open_lots: usize,
}

impl ReconcileCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let loaded = self.feed.load()?;
        let inputs = loaded.inputs.clone();
        let digest = loaded.digest.clone();
        let years = loaded.years.clone();
        let report = loaded.reconcile()?;

        let run_date = self
            .run_date
            .unwrap_or_else(|| Utc::now().date_naive())
            .format("%Y-%m-%d")
            .to_string();

        let mut outputs = self.render(&report, &run_date)?;
        let manifest = Manifest {
            run_date: run_date.clone(),
            years: years.years().map(|y| y.0).collect(),
            inputs,
            sha256: digest,
            summary: report.summary(),
            by_year: report
                .tax_years()
                .into_iter()
                .map(|year| YearSummary {
                    year: year.0,
                    summary: report.summary_for(year),
                })
                .collect(),
            warnings: report.warnings(),
            files: outputs.iter().map(|(name, _)| name.clone()).collect(),
        };
        let mut buf = Vec::new();
        write_json(&manifest, &mut buf)?;
        outputs.push((format!("manifest_{}.json", run_date), buf));

        // Everything is rendered, only now touch the filesystem
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create {}", self.out_dir.display()))?;
        for (name, bytes) in &outputs {
            let path = self.out_dir.join(name);
            fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        } else {
            self.print_text(&report, &years.display(), &outputs);
        }
        Ok(())
    }

    /// Serialize each selected record set into memory
    fn render(
        &self,
        report: &ReconciliationReport,
        run_date: &str,
    ) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        let mut outputs = Vec::new();
        if self.format.json() {
            let mut buf = Vec::new();
            write_json(&report.disposals, &mut buf)?;
            outputs.push((format!("disposals_{}.json", run_date), buf));

            let mut buf = Vec::new();
            write_json(report.carry_forward(), &mut buf)?;
            outputs.push((format!("open_purchases_{}.json", run_date), buf));

            let mut buf = Vec::new();
            write_json(&report.disposed_purchases, &mut buf)?;
            outputs.push((format!("disposed_purchases_{}.json", run_date), buf));
        }
        if self.format.csv() {
            let mut buf = Vec::new();
            write_disposals_csv(&report.disposals, &mut buf)?;
            outputs.push((format!("disposals_{}.csv", run_date), buf));

            let mut buf = Vec::new();
            write_purchases_csv(report.carry_forward(), &mut buf)?;
            outputs.push((format!("open_purchases_{}.csv", run_date), buf));

            let mut buf = Vec::new();
            write_purchases_csv(&report.disposed_purchases, &mut buf)?;
            outputs.push((format!("disposed_purchases_{}.csv", run_date), buf));
        }
        Ok(outputs)
    }

    fn print_text(&self, report: &ReconciliationReport, years: &str, outputs: &[(String, Vec<u8>)]) {
        println!();
        println!("RECONCILIATION ({})", years);
        println!();

        let mut rows: Vec<SummaryRow> = report
            .tax_years()
            .into_iter()
            .map(|year| summary_row(year.display(), &report.summary_for(year)))
            .collect();
        if rows.len() != 1 {
            rows.push(summary_row("Total".to_string(), &report.summary()));
        }
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        println!();

        let warnings = report.warnings();
        if !warnings.is_empty() {
            println!("\u{26A0} {} disposal(s) need attention:", warnings.len());
            for w in &warnings {
                match w {
                    Warning::UnderfundedDisposal {
                        symbol, quantity, ..
                    }
                    | Warning::ReviewRequiredDisposal {
                        symbol, quantity, ..
                    } => println!(
                        "  [{}] {} {} {}: {}",
                        w.type_name(),
                        w.txn_id(),
                        format_quantity(*quantity),
                        symbol,
                        w.message()
                    ),
                }
            }
            println!();
        }

        println!("Wrote {} file(s) to {}", outputs.len(), self.out_dir.display());
    }
}

fn summary_row(year: String, summary: &ReportSummary) -> SummaryRow {
    SummaryRow {
        year,
        disposals: summary.disposal_count,
        reconciled: summary.reconciled,
        review_required: summary.review_required,
        underfunded: summary.underfunded,
        proceeds: format_amount(summary.total_proceeds),
        cost_basis: format_amount(summary.total_cost_basis),
        gain: format_amount(summary.total_realized_gain),
        open_lots: summary.open_lots,
    }
}
