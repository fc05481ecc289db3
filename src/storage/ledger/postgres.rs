//! Ledger store implementation using PostgreSQL.
//!
//! Units of work run at read-committed isolation. Debit checks are serialized per
//! account with a transaction-scoped advisory lock, so each `sum_entries` after the
//! lock sees every entry committed by earlier holders. Token insertion uses
//! `ON CONFLICT DO NOTHING`: a unique violation would abort the whole transaction.

use super::schema::POSTGRES_SCHEMA;
use super::{AtomicUnit, LedgerStore, StoreError, TokenInsert};
use crate::crypto::hashing::account_lock_key;
use crate::domain::model::{Account, LedgerEntry, NewEntry};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};

#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Self::new_with_pool(pool).await
    }

    /// Wraps an existing pool and creates the ledger tables if they are missing.
    pub async fn new_with_pool(pool: PgPool) -> Result<Self, StoreError> {
        for stmt in POSTGRES_SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

struct PostgresUnit {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresUnit {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::UnitClosed)
    }
}

#[async_trait]
impl AtomicUnit for PostgresUnit {
    async fn lock_account(&mut self, account_id: &str) -> Result<(), StoreError> {
        let tx = self.tx()?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(account_lock_key(account_id))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_token(&mut self, key: &str) -> Result<TokenInsert, StoreError> {
        let tx = self.tx()?;
        let result = sqlx::query(
            "INSERT INTO idempotency_keys (key) VALUES ($1) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .execute(&mut **tx)
        .await?;
        Ok(if result.rows_affected() == 0 {
            TokenInsert::Duplicate
        } else {
            TokenInsert::Inserted
        })
    }

    async fn sum_entries(&mut self, account_id: &str) -> Result<i64, StoreError> {
        let tx = self.tx()?;
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM ledger_entries WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(sum)
    }

    async fn insert_entry(&mut self, entry: &NewEntry) -> Result<(), StoreError> {
        let tx = self.tx()?;
        sqlx::query("INSERT INTO ledger_entries (id, account_id, amount) VALUES ($1, $2, $3)")
            .bind(&entry.id)
            .bind(&entry.account_id)
            .bind(entry.amount)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::UnitClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn abort(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::UnitClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn AtomicUnit>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresUnit { tx: Some(tx) }))
    }

    async fn create_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO accounts (id, name, public_hash) VALUES ($1, $2, $3)")
            .bind(&account.id)
            .bind(&account.name)
            .bind(&account.public_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT id, name, public_hash FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some(Account {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                public_hash: r.try_get("public_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn balance(&self, account_id: &str) -> Result<i64, StoreError> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM ledger_entries WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }

    async fn list_entries(&self, account_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, account_id, amount, created_at FROM ledger_entries
             WHERE account_id = $1 ORDER BY seq",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for r in rows {
            entries.push(LedgerEntry {
                id: r.try_get("id")?,
                account_id: r.try_get("account_id")?,
                amount: r.try_get("amount")?,
                created_at: r.try_get("created_at")?,
            });
        }
        Ok(entries)
    }

    async fn token_consumed(&self, key: &str) -> Result<bool, StoreError> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT key FROM idempotency_keys WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Runs only against a live server: TEST_DATABASE_URL=postgres://...
    async fn live_store() -> Option<PostgresLedgerStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        if !url.starts_with("postgres") {
            return None;
        }
        Some(PostgresLedgerStore::connect(&url, 5).await.unwrap())
    }

    #[tokio::test]
    async fn duplicate_token_does_not_poison_transaction() {
        let Some(store) = live_store().await else {
            return;
        };
        let key = format!("pg-dup-{}", uuid::Uuid::new_v4());
        let account = format!("pg-acct-{}", uuid::Uuid::new_v4());

        let mut first = store.begin().await.unwrap();
        assert_eq!(first.insert_token(&key).await.unwrap(), TokenInsert::Inserted);
        first.commit().await.unwrap();

        let mut second = store.begin().await.unwrap();
        assert_eq!(second.insert_token(&key).await.unwrap(), TokenInsert::Duplicate);
        // The transaction is still usable after the conflict.
        assert_eq!(second.sum_entries(&account).await.unwrap(), 0);
        second.abort().await.unwrap();
    }

    #[tokio::test]
    async fn aborted_unit_leaves_nothing() {
        let Some(store) = live_store().await else {
            return;
        };
        let key = format!("pg-abort-{}", uuid::Uuid::new_v4());
        let account = format!("pg-acct-{}", uuid::Uuid::new_v4());

        let mut unit = store.begin().await.unwrap();
        unit.lock_account(&account).await.unwrap();
        unit.insert_token(&key).await.unwrap();
        unit.insert_entry(&NewEntry {
            id: format!("pg-entry-{}", uuid::Uuid::new_v4()),
            account_id: account.clone(),
            amount: 10,
        })
        .await
        .unwrap();
        unit.abort().await.unwrap();

        assert!(!store.token_consumed(&key).await.unwrap());
        assert_eq!(store.balance(&account).await.unwrap(), 0);
    }
}
