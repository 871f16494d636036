pub mod pools;
pub mod reconcile;
pub mod schema;
pub mod transactions;
pub mod validate;

use anyhow::Context;
use clap::Args;
use lotrecon::core::{reconcile, Purchase, ReconciliationReport, Transaction, YearFilter};
use lotrecon::feed::{self, SourceConfig};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Inputs shared by every command that reads a feed
#[derive(Args, Debug)]
pub struct FeedArgs {
    /// Feed file(s), CSV or JSON. Use "-" to read from stdin.
    #[arg(short, long = "feed", required = true)]
    feeds: Vec<PathBuf>,

    /// Source configuration (JSON) for raw exchange CSV exports
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Open purchases JSON from a previous run
    #[arg(short, long)]
    carry_forward: Option<PathBuf>,

    /// Calendar year to include (repeatable). All years if omitted.
    #[arg(short, long = "year")]
    years: Vec<i32>,
}

/// SHA-256 of one input file
#[derive(Debug, Clone, Serialize)]
pub struct InputDigest {
    pub path: String,
    pub sha256: String,
}

/// Everything read from disk for one run
pub struct LoadedFeed {
    pub transactions: Vec<Transaction>,
    pub carry_forward: Vec<Purchase>,
    pub years: YearFilter,
    pub inputs: Vec<InputDigest>,
    /// Digest over every input in the order given
    pub digest: String,
}

impl LoadedFeed {
    pub fn reconcile(self) -> anyhow::Result<ReconciliationReport> {
        let report = reconcile(self.transactions, self.carry_forward, &self.years)?;
        Ok(report)
    }
}

impl FeedArgs {
    pub fn year_filter(&self) -> YearFilter {
        YearFilter::new(self.years.iter().copied())
    }

    pub fn load(&self) -> anyhow::Result<LoadedFeed> {
        let source = match &self.source {
            Some(path) => {
                let bytes = read_input(path)?;
                let config = SourceConfig::from_json(bytes.as_slice())
                    .with_context(|| format!("Invalid source config {}", path.display()))?;
                Some(config)
            }
            None => None,
        };

        let mut hasher = Sha256::new();
        let mut inputs = Vec::new();
        let mut transactions = Vec::new();

        for path in &self.feeds {
            let bytes = read_input(path)?;
            hasher.update(&bytes);
            inputs.push(InputDigest {
                path: path.display().to_string(),
                sha256: hex::encode(Sha256::digest(&bytes)),
            });
            let txns = parse_feed(path, &bytes, source.as_ref())
                .with_context(|| format!("Failed to read feed {}", path.display()))?;
            transactions.extend(txns);
        }
        transactions.sort_by(|a, b| a.common().fifo_cmp(b.common()));

        let carry_forward = match &self.carry_forward {
            Some(path) => {
                let bytes = read_input(path)?;
                hasher.update(&bytes);
                inputs.push(InputDigest {
                    path: path.display().to_string(),
                    sha256: hex::encode(Sha256::digest(&bytes)),
                });
                feed::read_carry_forward(bytes.as_slice())
                    .with_context(|| format!("Failed to read carry-forward {}", path.display()))?
            }
            None => Vec::new(),
        };

        Ok(LoadedFeed {
            transactions,
            carry_forward,
            years: self.year_filter(),
            inputs,
            digest: hex::encode(hasher.finalize()),
        })
    }
}

/// Parse one feed file. JSON is always the normalized feed; CSV goes
/// through the key mapping when a source config is given.
fn parse_feed(
    path: &Path,
    bytes: &[u8],
    source: Option<&SourceConfig>,
) -> anyhow::Result<Vec<Transaction>> {
    let txns = if is_json(path, bytes) {
        let records = feed::read_json(bytes)?;
        feed::into_transactions(&records, None)?
    } else if let Some(source) = source {
        let records = feed::read_mapped_csv(bytes, source)?;
        feed::into_transactions(&records, source.time_format.as_deref())?
    } else {
        let records = feed::read_csv(bytes)?;
        feed::into_transactions(&records, None)?
    };
    Ok(txns)
}

fn is_json(path: &Path, bytes: &[u8]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.eq_ignore_ascii_case("json"),
        // stdin: sniff the first non-blank byte
        None => bytes
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{' || *b == b'['),
    }
}

/// Read a whole file (or stdin with "-")
fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
        Ok(buffer)
    } else {
        fs::read(path).with_context(|| format!("Failed to open {}", path.display()))
    }
}

pub(crate) fn format_quantity(qty: f64) -> String {
    let s = format!("{:.8}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

pub(crate) fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}
