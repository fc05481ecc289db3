//! Domain model definitions for the ledger.

pub mod events;
pub mod ledger;

pub use events::{TransactionRequested, SUBJECT_TX_CREATED};
pub use ledger::{Account, ApplyOutcome, LedgerEntry, NewEntry, RejectReason};

/// Returned when a command or event does not have the shape the ledger accepts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);
