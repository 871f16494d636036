use super::transaction::{Disposal, DisposalStatus};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Disposals that need manual follow-up after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// The pool ran out of lots before the disposal was covered.
    /// When `reconciled = 0`, no cost basis was found at all.
    UnderfundedDisposal {
        txn_id: String,
        exchange: String,
        symbol: String,
        date: DateTime<Utc>,
        quantity: f64,
        reconciled: f64,
        unreconciled: f64,
    },
    /// The next lot for the symbol is dated after the disposal; prior-period
    /// lots are probably missing from the carry-forward.
    ReviewRequiredDisposal {
        txn_id: String,
        exchange: String,
        symbol: String,
        date: DateTime<Utc>,
        quantity: f64,
        reconciled: f64,
    },
}

impl Warning {
    /// The warning a disposal's terminal state calls for, if any
    pub fn for_disposal(disposal: &Disposal) -> Option<Warning> {
        let c = &disposal.common;
        match disposal.status {
            DisposalStatus::Underfunded => Some(Warning::UnderfundedDisposal {
                txn_id: c.txn_id.clone(),
                exchange: c.exchange.clone(),
                symbol: c.symbol.clone(),
                date: c.date,
                quantity: c.quantity,
                reconciled: disposal.quantity_reconciled,
                unreconciled: disposal.unreconciled(),
            }),
            DisposalStatus::ReviewRequired => Some(Warning::ReviewRequiredDisposal {
                txn_id: c.txn_id.clone(),
                exchange: c.exchange.clone(),
                symbol: c.symbol.clone(),
                date: c.date,
                quantity: c.quantity,
                reconciled: disposal.quantity_reconciled,
            }),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Warning::UnderfundedDisposal { .. } => "Underfunded",
            Warning::ReviewRequiredDisposal { .. } => "ReviewRequired",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Warning::UnderfundedDisposal {
                reconciled,
                unreconciled,
                ..
            } if *reconciled == 0.0 => format!(
                "No matching purchases found - {} units have no cost basis",
                unreconciled
            ),
            Warning::UnderfundedDisposal {
                reconciled,
                unreconciled,
                ..
            } => format!(
                "Purchases only covered {} units - {} units missing from inventory",
                reconciled, unreconciled
            ),
            Warning::ReviewRequiredDisposal { .. } => {
                "Next lot is dated after the disposal - supply prior-period purchases".to_string()
            }
        }
    }

    pub fn txn_id(&self) -> &str {
        match self {
            Warning::UnderfundedDisposal { txn_id, .. }
            | Warning::ReviewRequiredDisposal { txn_id, .. } => txn_id,
        }
    }
}
