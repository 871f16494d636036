//! Normalized transaction feed - the records adapters hand to the engine

pub mod source;

pub use source::{read_mapped_csv, KeyMapping, SourceConfig};

use crate::core::{Disposal, FeedError, Purchase, Transaction, TxnCommon};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lotrecon_derive::CsvSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Column description generated by `#[derive(CsvSchema)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// JSON feed root
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeedInput {
    pub transactions: Vec<FeedRecord>,
}

/// One normalized fill from an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, CsvSchema)]
pub struct FeedRecord {
    /// Fill time in UTC (RFC3339, YYYY-MM-DDThh:mm:ss.fffZ or YYYY-MM-DD)
    pub utc_time: String,
    /// Normalized symbol without separators (e.g. BTCUSD)
    pub symbol: String,
    /// buy or sell
    pub side: String,
    /// Unit price
    pub price: f64,
    /// Quantity filled
    pub quantity: f64,
    /// Transaction id, unique within the exchange
    pub txn_id: String,
    /// Fee charged on the fill, 0 if omitted
    #[serde(default)]
    pub fee: Option<f64>,
    /// Source exchange (e.g. Coinbase Pro, Robinhood, Strike)
    pub exchange: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(txn_id: &str, side: &str) -> Result<Side, FeedError> {
        match side.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(FeedError::InvalidSide {
                txn_id: txn_id.to_string(),
                side: side.to_string(),
            }),
        }
    }
}

impl FeedRecord {
    /// Convert into a typed transaction.
    ///
    /// Purchases get `cost_basis = price * quantity + fee`; disposals get
    /// `proceeds = price * quantity - fee` and start with zero cost basis.
    /// Sell quantities are taken as absolute values since some exchanges
    /// report them negative.
    pub fn to_transaction(&self, time_format: Option<&str>) -> Result<Transaction, FeedError> {
        let side = Side::parse(&self.txn_id, &self.side)?;
        let date = parse_datetime(&self.utc_time, time_format)?;
        let quantity = match side {
            Side::Buy => self.quantity,
            Side::Sell => self.quantity.abs(),
        };
        let fee = self.fee.unwrap_or(0.0);
        let common = TxnCommon {
            symbol: self.symbol.clone(),
            quantity,
            date,
            txn_id: self.txn_id.clone(),
            exchange: self.exchange.clone(),
            cost_basis: 0.0,
        };

        let txn = match side {
            Side::Buy => Transaction::Purchase(Purchase::new(TxnCommon {
                cost_basis: self.price * quantity + fee,
                ..common
            })),
            Side::Sell => Transaction::Disposal(Disposal::new(
                common,
                self.price,
                self.price * quantity - fee,
            )),
        };
        Ok(txn)
    }
}

/// Convert feed records into transactions sorted by date
pub fn into_transactions(
    records: &[FeedRecord],
    time_format: Option<&str>,
) -> Result<Vec<Transaction>, FeedError> {
    let mut transactions = records
        .iter()
        .map(|r| r.to_transaction(time_format))
        .collect::<Result<Vec<_>, _>>()?;
    transactions.sort_by(|a, b| a.common().fifo_cmp(b.common()));
    Ok(transactions)
}

/// Read a normalized feed from CSV
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<FeedRecord>, FeedError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let records = rdr
        .deserialize::<FeedRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("Read {} feed records", records.len());
    Ok(records)
}

/// Read a normalized feed from JSON
pub fn read_json<R: Read>(reader: R) -> Result<Vec<FeedRecord>, FeedError> {
    let input: FeedInput = serde_json::from_reader(reader)?;
    log::info!("Read {} feed records", input.transactions.len());
    Ok(input.transactions)
}

/// Read carry-forward lots, i.e. a previous run's open purchases JSON
pub fn read_carry_forward<R: Read>(reader: R) -> Result<Vec<Purchase>, FeedError> {
    let lots: Vec<Purchase> = serde_json::from_reader(reader)?;
    log::info!("Read {} carry-forward lots", lots.len());
    Ok(lots)
}

/// Parse a UTC timestamp.
///
/// A source-specific `custom` format is tried first and read as UTC; then
/// RFC3339, naive date-times and bare dates (midnight).
pub fn parse_datetime(s: &str, custom: Option<&str>) -> Result<DateTime<Utc>, FeedError> {
    let s = s.trim();

    if let Some(fmt) = custom {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.and_utc());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    Err(FeedError::InvalidDatetime(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_normalized_csv() {
        let csv_data = "utc_time,symbol,side,price,quantity,txn_id,fee,exchange
2022-01-15T10:30:00.000Z,BTCUSD,buy,40000,0.5,a1,25,Coinbase Pro
2022-03-20,BTCUSD,SELL,45000,0.25,a2,,Coinbase Pro
";
        let records = read_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].fee, None);

        let txns = into_transactions(&records, None).unwrap();
        match &txns[0] {
            Transaction::Purchase(p) => {
                assert_eq!(p.common.cost_basis, 40000.0 * 0.5 + 25.0);
                assert_eq!(
                    p.common.date,
                    Utc.with_ymd_and_hms(2022, 1, 15, 10, 30, 0).unwrap()
                );
            }
            other => panic!("expected purchase, got {:?}", other),
        }
        match &txns[1] {
            Transaction::Disposal(d) => {
                assert_eq!(d.proceeds, 45000.0 * 0.25);
                assert_eq!(d.price, 45000.0);
                assert_eq!(d.common.cost_basis, 0.0);
            }
            other => panic!("expected disposal, got {:?}", other),
        }
    }

    #[test]
    fn parse_json_feed_sorted_by_date() {
        let json_data = r#"{
            "transactions": [
                {"utc_time": "2022-06-15", "symbol": "ETHUSD", "side": "sell",
                 "price": 1200.0, "quantity": 1.0, "txn_id": "2", "exchange": "Strike"},
                {"utc_time": "2022-01-15", "symbol": "ETHUSD", "side": "buy",
                 "price": 3000.0, "quantity": 1.0, "txn_id": "1", "exchange": "Strike"}
            ]
        }"#;
        let records = read_json(json_data.as_bytes()).unwrap();
        let txns = into_transactions(&records, None).unwrap();
        assert_eq!(txns[0].kind(), "Purchase");
        assert_eq!(txns[1].kind(), "Disposal");
    }

    #[test]
    fn negative_sell_quantity_is_made_positive() {
        let record = FeedRecord {
            utc_time: "2022-01-01".to_string(),
            symbol: "BTCUSD".to_string(),
            side: "sell".to_string(),
            price: 100.0,
            quantity: -2.0,
            txn_id: "s".to_string(),
            fee: Some(1.0),
            exchange: "Strike".to_string(),
        };
        match record.to_transaction(None).unwrap() {
            Transaction::Disposal(d) => {
                assert_eq!(d.common.quantity, 2.0);
                assert_eq!(d.proceeds, 199.0);
            }
            other => panic!("expected disposal, got {:?}", other),
        }
    }

    #[test]
    fn unknown_side_is_rejected() {
        let err = Side::parse("x", "transfer").unwrap_err();
        assert!(matches!(err, FeedError::InvalidSide { .. }));
    }

    #[test]
    fn datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2022, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_datetime("2022-05-01T12:00:00Z", None).unwrap(), expected);
        assert_eq!(parse_datetime("2022-05-01T14:00:00+02:00", None).unwrap(), expected);
        assert_eq!(parse_datetime("2022-05-01T12:00:00.000Z", None).unwrap(), expected);
        assert_eq!(parse_datetime("2022-05-01 12:00:00", None).unwrap(), expected);
        assert_eq!(
            parse_datetime("May 01 2022 12:00:00", Some("%b %d %Y %H:%M:%S")).unwrap(),
            expected
        );
        assert_eq!(
            parse_datetime("2022-05-01", None).unwrap(),
            Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap()
        );
        assert!(matches!(
            parse_datetime("yesterday", None),
            Err(FeedError::InvalidDatetime(_))
        ));
    }

    #[test]
    fn csv_schema_lists_feed_columns() {
        assert_eq!(
            FeedRecord::csv_header(),
            vec!["utc_time", "symbol", "side", "price", "quantity", "txn_id", "fee", "exchange"]
        );
        let fee = FeedRecord::csv_schema()
            .iter()
            .find(|f| f.name == "fee")
            .unwrap();
        assert!(!fee.required);
        assert_eq!(fee.description, "Fee charged on the fill, 0 if omitted");
        assert!(FeedRecord::csv_schema()[0].required);
    }

    #[test]
    fn carry_forward_reads_open_purchases() {
        let json_data = r#"[{"symbol": "BTCUSD", "quantity": 1.0, "date": "2021-06-01T00:00:00Z",
            "txn_id": "p1", "exchange": "Strike", "cost_basis": 30000.0,
            "qty_disposed": 0.25, "full_disposal": false}]"#;
        let lots = read_carry_forward(json_data.as_bytes()).unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].qty_disposed, 0.25);
        assert_eq!(lots[0].remaining(), 0.75);
    }
}
