//! Accounts, entries and the outcome of applying a transaction intent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// An account. Created once, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Opaque commitment supplied by the client. Stored verbatim.
    pub public_hash: String,
}

/// A committed, immutable balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    pub id: String,
    pub account_id: String,
    /// Minor units. Positive = credit, negative = debit.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// An entry about to be written inside an atomic unit of work.
///
/// `created_at` is not part of it: the store stamps the entry on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub id: String,
    pub account_id: String,
    pub amount: i64,
}

/// Why a transaction was refused. Refusals are terminal and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InsufficientFunds,
    /// The credit would push the balance past what an `i64` can hold.
    BalanceOverflow,
}

/// Result of applying one transaction intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The token and the entry were committed together.
    Applied,
    /// The idempotency key was already consumed; nothing was written.
    AlreadyApplied,
    /// Business refusal. The token was rolled back so the key stays reusable.
    Rejected(RejectReason),
    /// The unit of work could not complete. No state was left behind.
    Failed(String),
}

impl ApplyOutcome {
    /// Short label used as the `outcome` field in logs.
    pub fn label(&self) -> &'static str {
        match self {
            ApplyOutcome::Applied => "applied",
            ApplyOutcome::AlreadyApplied => "already_applied",
            ApplyOutcome::Rejected(RejectReason::InsufficientFunds) => "rejected_insufficient_funds",
            ApplyOutcome::Rejected(RejectReason::BalanceOverflow) => "rejected_balance_overflow",
            ApplyOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InsufficientFunds => f.write_str("insufficient funds"),
            RejectReason::BalanceOverflow => f.write_str("balance overflow"),
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::Applied => f.write_str("applied"),
            ApplyOutcome::AlreadyApplied => f.write_str("already applied"),
            ApplyOutcome::Rejected(reason) => write!(f, "rejected: {}", reason),
            ApplyOutcome::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_carry_their_reason() {
        let overflow = ApplyOutcome::Rejected(RejectReason::BalanceOverflow);
        assert_eq!(overflow.label(), "rejected_balance_overflow");
        assert_eq!(overflow.to_string(), "rejected: balance overflow");
    }

    #[test]
    fn display_includes_failure_message() {
        let outcome = ApplyOutcome::Failed("pool timed out".into());
        assert_eq!(outcome.to_string(), "failed: pool timed out");
        assert_eq!(
            ApplyOutcome::Rejected(RejectReason::InsufficientFunds).label(),
            "rejected_insufficient_funds"
        );
    }
}
