//! FIFO lot reconciliation: match disposals against purchase lots across
//! reporting periods and carry the open lots forward.

pub mod core;
pub mod feed;
