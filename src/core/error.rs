/// Problems with how a transaction source is described. Raised before any
/// transaction is read.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("exchange name must be specified")]
    MissingExchange,
    #[error("column '{column}' mapped for '{field}' not found in input")]
    MissingColumn { field: String, column: String },
    #[error("invalid source configuration: {0}")]
    InvalidConfig(String),
}

/// The transaction feed is incomplete or malformed. No matching is attempted
/// when any of these is raised.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),
    #[error("invalid number for {field}: '{value}'")]
    InvalidNumber { field: String, value: String },
    #[error("invalid side '{side}' for transaction {txn_id}")]
    InvalidSide { txn_id: String, side: String },
    #[error("quantity must be positive for transaction {txn_id}: {quantity}")]
    InvalidQuantity { txn_id: String, quantity: f64 },
    #[error("{field} is not a finite number for transaction {txn_id}")]
    NonFiniteAmount { txn_id: String, field: String },
    #[error("symbol '{symbol}' is not normalized for transaction {txn_id}")]
    UnnormalizedSymbol { txn_id: String, symbol: String },
    #[error("missing transaction id on {exchange} row")]
    MissingTransactionId { exchange: String },
    #[error("duplicate transaction id on {exchange}: {txn_id}")]
    DuplicateTransactionId { exchange: String, txn_id: String },
    #[error("invalid carry-forward lot {txn_id}: {reason}")]
    InvalidCarryForward { txn_id: String, reason: String },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
