//! The Command Gateway.
//!
//! Account creation is a direct, synchronous write. Transaction requests are only
//! validated and handed to the event channel: the returned intent means "accepted",
//! never "applied". Callers observe the effect through the balance read path.

use crate::domain::model::{Account, LedgerEntry, TransactionRequested, ValidationError};
use crate::infra::ids;
use crate::storage::ledger::{LedgerStore, StoreError};
use crate::transport::events::{ChannelError, EventChannel};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Clone)]
pub struct CommandGateway {
    store: Arc<dyn LedgerStore>,
    channel: Arc<dyn EventChannel>,
}

impl CommandGateway {
    pub fn new(store: Arc<dyn LedgerStore>, channel: Arc<dyn EventChannel>) -> Self {
        Self { store, channel }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    #[instrument(skip(self, public_hash))]
    pub async fn create_account(&self, name: &str, public_hash: &str) -> Result<Account, GatewayError> {
        if name.trim().is_empty() || public_hash.trim().is_empty() {
            return Err(ValidationError("name and public_hash required".to_string()).into());
        }
        let account = Account {
            id: ids::rand_id(),
            name: name.to_string(),
            public_hash: public_hash.to_string(),
        };
        self.store.create_account(&account).await?;
        info!(account_id = %account.id, "account created");
        Ok(account)
    }

    /// Validates and emits a transaction intent. Returns as soon as the channel accepted it.
    #[instrument(skip(self))]
    pub async fn request_transaction(
        &self,
        account_id: &str,
        amount: i64,
        idempotency_key: &str,
    ) -> Result<TransactionRequested, GatewayError> {
        let event = TransactionRequested {
            event_id: ids::event_id(),
            account_id: account_id.to_string(),
            amount,
            idempotency_key: idempotency_key.to_string(),
        };
        event.validate()?;
        self.channel.publish(&event).await?;
        info!(event_id = %event.event_id, "transaction intent published");
        Ok(event)
    }

    pub async fn balance(&self, account_id: &str) -> Result<i64, GatewayError> {
        Ok(self.store.balance(account_id).await?)
    }

    pub async fn account(&self, account_id: &str) -> Result<Option<Account>, GatewayError> {
        Ok(self.store.get_account(account_id).await?)
    }

    pub async fn entries(&self, account_id: &str) -> Result<Vec<LedgerEntry>, GatewayError> {
        Ok(self.store.list_entries(account_id).await?)
    }
}
