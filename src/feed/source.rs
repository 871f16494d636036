//! Per-exchange source configuration: maps an exchange's own CSV export
//! columns onto the normalized feed fields.

use super::FeedRecord;
use crate::core::{ConfigurationError, FeedError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Raw column name for each normalized field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct KeyMapping {
    pub utc_time: String,
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub quantity: String,
    pub txn_id: String,
    /// Unset: a `fee` column is used when the export has one, otherwise fees
    /// are 0. Set: the named column must exist.
    pub fee: Option<String>,
}

impl Default for KeyMapping {
    fn default() -> Self {
        KeyMapping {
            utc_time: "utc_time".to_string(),
            symbol: "symbol".to_string(),
            side: "side".to_string(),
            price: "price".to_string(),
            quantity: "quantity".to_string(),
            txn_id: "txn_id".to_string(),
            fee: None,
        }
    }
}

const DEFAULT_FEE_COLUMN: &str = "fee";

/// How to read one exchange's export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceConfig {
    /// Exchange name stamped on every transaction read from this source
    pub exchange: String,
    #[serde(default)]
    pub key_mapping: KeyMapping,
    /// chrono format for the time column, read as UTC
    #[serde(default)]
    pub time_format: Option<String>,
    /// Strip venue separators from symbols ("BTC-USD" becomes "BTCUSD")
    #[serde(default = "default_normalize_symbols")]
    pub normalize_symbols: bool,
}

fn default_normalize_symbols() -> bool {
    true
}

impl SourceConfig {
    pub fn new(exchange: &str) -> Result<Self, ConfigurationError> {
        let config = SourceConfig {
            exchange: exchange.to_string(),
            key_mapping: KeyMapping::default(),
            time_format: None,
            normalize_symbols: true,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_key_mapping(mut self, key_mapping: KeyMapping) -> Self {
        self.key_mapping = key_mapping;
        self
    }

    pub fn with_time_format(mut self, time_format: &str) -> Self {
        self.time_format = Some(time_format.to_string());
        self
    }

    /// Read and validate a JSON source configuration
    pub fn from_json<R: Read>(reader: R) -> Result<Self, FeedError> {
        let config: SourceConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.exchange.trim().is_empty() {
            return Err(ConfigurationError::MissingExchange);
        }
        let m = &self.key_mapping;
        let required = [
            ("utc_time", &m.utc_time),
            ("symbol", &m.symbol),
            ("side", &m.side),
            ("price", &m.price),
            ("quantity", &m.quantity),
            ("txn_id", &m.txn_id),
        ];
        if let Some((field, _)) = required.iter().find(|(_, column)| column.trim().is_empty()) {
            return Err(ConfigurationError::InvalidConfig(format!(
                "no column mapped for '{}'",
                field
            )));
        }
        Ok(())
    }

    fn normalize_symbol(&self, symbol: &str) -> String {
        let symbol = symbol.trim();
        if self.normalize_symbols {
            symbol.chars().filter(|c| *c != '-' && *c != '/').collect()
        } else {
            symbol.to_string()
        }
    }
}

struct ColumnIndex {
    utc_time: usize,
    symbol: usize,
    side: usize,
    price: usize,
    quantity: usize,
    txn_id: usize,
    fee: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, mapping: &KeyMapping) -> Result<Self, ConfigurationError> {
        let position = |column: &str| headers.iter().position(|h| h.trim() == column);
        let find = |field: &str, column: &str| {
            position(column).ok_or_else(|| ConfigurationError::MissingColumn {
                field: field.to_string(),
                column: column.to_string(),
            })
        };
        Ok(ColumnIndex {
            utc_time: find("utc_time", &mapping.utc_time)?,
            symbol: find("symbol", &mapping.symbol)?,
            side: find("side", &mapping.side)?,
            price: find("price", &mapping.price)?,
            quantity: find("quantity", &mapping.quantity)?,
            txn_id: find("txn_id", &mapping.txn_id)?,
            fee: match mapping.fee.as_deref() {
                Some(column) => Some(find("fee", column)?),
                None => position(DEFAULT_FEE_COLUMN),
            },
        })
    }
}

/// Read an exchange export using the source's key mapping.
/// Every record is stamped with the source's exchange name.
pub fn read_mapped_csv<R: Read>(reader: R, source: &SourceConfig) -> Result<Vec<FeedRecord>, FeedError> {
    source.validate()?;

    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let columns = ColumnIndex::resolve(&headers, &source.key_mapping)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let get = |idx: usize| row.get(idx).unwrap_or("").trim();

        let fee = match columns.fee.map(get) {
            Some(value) if !value.is_empty() => Some(parse_number("fee", value)?),
            _ => None,
        };
        records.push(FeedRecord {
            utc_time: get(columns.utc_time).to_string(),
            symbol: source.normalize_symbol(get(columns.symbol)),
            side: get(columns.side).to_ascii_lowercase(),
            price: parse_number("price", get(columns.price))?,
            quantity: parse_number("quantity", get(columns.quantity))?,
            txn_id: get(columns.txn_id).to_string(),
            fee,
            exchange: source.exchange.clone(),
        });
    }

    log::info!("Read {} {} records", records.len(), source.exchange);
    Ok(records)
}

/// Numbers in exchange exports may carry currency symbols and separators
fn parse_number(field: &str, value: &str) -> Result<f64, FeedError> {
    let cleaned: String = value.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned.trim().parse::<f64>().map_err(|_| FeedError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}
