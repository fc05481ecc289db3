//! The Ledger Store: accounts, append-only entries and consumed idempotency tokens.
//!
//! Writes that must land together go through an [`AtomicUnit`] obtained from
//! [`LedgerStore::begin`]. Everything done through one unit commits or aborts as a whole;
//! dropping a unit without committing it aborts it.

pub mod postgres;
pub mod schema;
pub mod sqlite;

use crate::domain::model::{Account, LedgerEntry, NewEntry};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use postgres::PostgresLedgerStore;
pub use sqlite::SqliteLedgerStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store operation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("atomic unit already committed or aborted")]
    UnitClosed,

    #[error("unsupported DATABASE_URL scheme: {0}")]
    UnsupportedUrl(String),
}

/// Result of inserting an idempotency token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInsert {
    /// The key was not consumed before; it is now (pending commit).
    Inserted,
    /// The key is already consumed.
    Duplicate,
}

/// One atomic, isolated unit of work against the store.
#[async_trait]
pub trait AtomicUnit: Send {
    /// Serializes this unit against other units locking the same account.
    /// Held until commit or abort.
    async fn lock_account(&mut self, account_id: &str) -> Result<(), StoreError>;

    /// Insert-returns-duplicate-or-new on the consumed token set.
    async fn insert_token(&mut self, key: &str) -> Result<TokenInsert, StoreError>;

    /// Sum of committed entries for the account as seen from inside this unit.
    async fn sum_entries(&mut self, account_id: &str) -> Result<i64, StoreError>;

    async fn insert_entry(&mut self, entry: &NewEntry) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn abort(&mut self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn AtomicUnit>, StoreError>;

    async fn create_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// Balance derived from committed entries. Unknown accounts have balance 0.
    async fn balance(&self, account_id: &str) -> Result<i64, StoreError>;

    /// Committed entries for the account, oldest first.
    async fn list_entries(&self, account_id: &str) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn token_consumed(&self, key: &str) -> Result<bool, StoreError>;

    /// Round-trip used by the health check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Connects to the store named by `database_url` and creates the schema if missing.
///
/// `postgres://` / `postgresql://` select PostgreSQL, `sqlite:` selects SQLite.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
) -> Result<Arc<dyn LedgerStore>, StoreError> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let store = PostgresLedgerStore::connect(database_url, max_connections).await?;
        Ok(Arc::new(store))
    } else if database_url.starts_with("sqlite:") {
        let store = SqliteLedgerStore::connect(database_url, max_connections).await?;
        Ok(Arc::new(store))
    } else {
        let scheme = database_url.split(':').next().unwrap_or_default();
        Err(StoreError::UnsupportedUrl(scheme.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let err = connect("mysql://localhost/ledger", 1).await.err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedUrl(s) if s == "mysql"));
    }

    #[tokio::test]
    async fn sqlite_url_selects_sqlite_backend() {
        let store = connect("sqlite::memory:", 1).await.unwrap();
        store.ping().await.unwrap();
        assert_eq!(store.balance("nobody").await.unwrap(), 0);
    }
}
