//! Schema command - print expected input and output formats

use clap::Args;
use lotrecon::core::ReconciliationReport;
use lotrecon::feed::{FeedInput, FeedRecord, SourceConfig};
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the normalized feed
    JsonSchema,
    /// JSON Schema for a per-exchange source config
    SourceSchema,
    /// JSON Schema for the reconciliation report
    ReportSchema,
    /// CSV header row with column names
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                println!("{}", serde_json::to_string_pretty(&schema_for!(FeedInput))?)
            }
            SchemaFormat::SourceSchema => {
                println!("{}", serde_json::to_string_pretty(&schema_for!(SourceConfig))?)
            }
            SchemaFormat::ReportSchema => println!(
                "{}",
                serde_json::to_string_pretty(&schema_for!(ReconciliationReport))?
            ),
            SchemaFormat::CsvHeader => println!("{}", FeedRecord::csv_header().join(",")),
            SchemaFormat::CsvFields => print_csv_fields(),
        }
        Ok(())
    }
}

fn print_csv_fields() {
    println!("CSV Input Format");
    println!("================");
    println!();
    for field in FeedRecord::csv_schema() {
        let req = if field.required { "required" } else { "optional" };
        println!("{:12} ({:8})  {}", field.name, req, field.description);
    }
    println!();
    println!("Raw exchange exports can be read with --source <config.json>; see source-schema");
}
