pub mod batch;
pub mod error;
pub mod matching;
pub mod pool;
pub mod report;
pub mod transaction;
pub mod warnings;
pub mod year;

// Flat public surface for domain types and functions.
pub use batch::{is_normalized_symbol, reconcile};
pub use error::{ConfigurationError, FeedError};
pub use matching::match_disposal;
pub use pool::LotPool;
pub use report::{
    write_disposals_csv, write_json, write_purchases_csv, DisposalRow, PurchaseRow,
    ReconciliationReport, ReportSummary,
};
pub use transaction::{
    AssociatedPurchase, Disposal, DisposalStatus, Purchase, Transaction, TxnCommon, QTY_TOLERANCE,
};
pub use warnings::Warning;
pub use year::{TaxYear, YearFilter};
