//! The transaction intent carried over the event channel.

use super::ValidationError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Subject that carries `TransactionRequested` events.
pub const SUBJECT_TX_CREATED: &str = "tx.created";

/// A requested transaction that has not been applied yet.
///
/// Delivered at least once. `idempotency_key` is what makes redelivery a no-op;
/// `event_id` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequested {
    pub event_id: String,
    pub account_id: String,
    pub amount: i64,
    pub idempotency_key: String,
}

impl TransactionRequested {
    /// Checks the shape shared by the gateway and the consumer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_intent(&self.account_id, self.amount, &self.idempotency_key)
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

pub(crate) fn validate_intent(
    account_id: &str,
    amount: i64,
    idempotency_key: &str,
) -> Result<(), ValidationError> {
    if account_id.trim().is_empty() || amount == 0 || idempotency_key.trim().is_empty() {
        return Err(ValidationError(
            "account_id, amount, idempotency_key required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(amount: i64, key: &str) -> TransactionRequested {
        TransactionRequested {
            event_id: "evt-1".into(),
            account_id: "acct-1".into(),
            amount,
            idempotency_key: key.into(),
        }
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(intent(0, "k1").validate().is_err());
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(intent(10, "   ").validate().is_err());
    }

    #[test]
    fn debit_is_a_valid_shape() {
        assert!(intent(-10, "k1").validate().is_ok());
    }

    #[test]
    fn wire_format_uses_snake_case_fields() {
        let bytes = intent(42, "k9").to_json_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["event_id"], "evt-1");
        assert_eq!(value["account_id"], "acct-1");
        assert_eq!(value["amount"], 42);
        assert_eq!(value["idempotency_key"], "k9");
    }

    #[test]
    fn undecodable_payload_is_an_error() {
        assert!(TransactionRequested::from_json_bytes(b"{\"amount\":\"ten\"}").is_err());
    }
}
