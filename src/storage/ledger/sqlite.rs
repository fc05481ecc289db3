//! Ledger store implementation using SQLite.
//!
//! SQLite allows one writer at a time. The first statement of every unit is the
//! token insert, which takes the write lock, so units touching the ledger are
//! serialized database-wide until commit or rollback. `lock_account` has nothing
//! to add on top of that.

use super::schema::SQLITE_SCHEMA;
use super::{AtomicUnit, LedgerStore, StoreError, TokenInsert};
use crate::domain::model::{Account, LedgerEntry, NewEntry};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Opens (creating if missing) the database at `database_url`.
    ///
    /// In-memory databases live inside a single connection, so the pool is pinned
    /// to exactly one connection that is never recycled.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        Self::new_with_pool(pool).await
    }

    /// Fresh private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        for stmt in SQLITE_SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

struct SqliteUnit {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteUnit {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Sqlite>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::UnitClosed)
    }
}

#[async_trait]
impl AtomicUnit for SqliteUnit {
    async fn lock_account(&mut self, _account_id: &str) -> Result<(), StoreError> {
        self.tx()?;
        Ok(())
    }

    async fn insert_token(&mut self, key: &str) -> Result<TokenInsert, StoreError> {
        let tx = self.tx()?;
        let result =
            sqlx::query("INSERT INTO idempotency_keys (key) VALUES (?) ON CONFLICT (key) DO NOTHING")
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
        let sum: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(&mut **tx)
                .await?;
        Ok(sum)
    }

    async fn insert_entry(&mut self, entry: &NewEntry) -> Result<(), StoreError> {
        let tx = self.tx()?;
        sqlx::query(
            "INSERT INTO ledger_entries (id, account_id, amount, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.account_id)
        .bind(entry.amount)
        .bind(Utc::now())
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
impl LedgerStore for SqliteLedgerStore {
    async fn begin(&self) -> Result<Box<dyn AtomicUnit>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteUnit { tx: Some(tx) }))
    }

    async fn create_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO accounts (id, name, public_hash) VALUES (?, ?, ?)")
            .bind(&account.id)
            .bind(&account.name)
            .bind(&account.public_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT id, name, public_hash FROM accounts WHERE id = ?")
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
        let sum: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(sum)
    }

    async fn list_entries(&self, account_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, account_id, amount, created_at FROM ledger_entries
             WHERE account_id = ? ORDER BY seq",
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
        let found: Option<String> = sqlx::query_scalar("SELECT key FROM idempotency_keys WHERE key = ?")
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

    fn entry(id: &str, account_id: &str, amount: i64) -> NewEntry {
        NewEntry {
            id: id.to_string(),
            account_id: account_id.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn committed_unit_is_visible() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        assert_eq!(unit.insert_token("k1").await.unwrap(), TokenInsert::Inserted);
        unit.insert_entry(&entry("e1", "a", 100)).await.unwrap();
        unit.commit().await.unwrap();

        assert!(store.token_consumed("k1").await.unwrap());
        assert_eq!(store.balance("a").await.unwrap(), 100);
        let entries = store.list_entries("a").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "e1");
        assert_eq!(entries[0].amount, 100);
    }

    #[tokio::test]
    async fn aborted_unit_discards_token_and_entry() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        unit.insert_token("k1").await.unwrap();
        unit.insert_entry(&entry("e1", "a", 100)).await.unwrap();
        unit.abort().await.unwrap();

        assert!(!store.token_consumed("k1").await.unwrap());
        assert_eq!(store.balance("a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dropped_unit_rolls_back() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();
        {
            let mut unit = store.begin().await.unwrap();
            unit.insert_token("k1").await.unwrap();
        }
        assert!(!store.token_consumed("k1").await.unwrap());
    }

    #[tokio::test]
    async fn second_token_insert_reports_duplicate() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        unit.insert_token("k1").await.unwrap();
        unit.commit().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        assert_eq!(unit.insert_token("k1").await.unwrap(), TokenInsert::Duplicate);
        unit.abort().await.unwrap();
    }

    #[tokio::test]
    async fn sum_sees_committed_entries() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        unit.insert_token("k1").await.unwrap();
        unit.insert_entry(&entry("e1", "a", 70)).await.unwrap();
        unit.commit().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        unit.insert_token("k2").await.unwrap();
        assert_eq!(unit.sum_entries("a").await.unwrap(), 70);
        assert_eq!(unit.sum_entries("b").await.unwrap(), 0);
        unit.abort().await.unwrap();
    }

    #[tokio::test]
    async fn closed_unit_refuses_further_work() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();
        let mut unit = store.begin().await.unwrap();
        unit.commit().await.unwrap();
        assert!(matches!(
            unit.insert_token("k1").await,
            Err(StoreError::UnitClosed)
        ));
        assert!(matches!(unit.commit().await, Err(StoreError::UnitClosed)));
    }

    #[tokio::test]
    async fn accounts_round_trip() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();
        let account = Account {
            id: "a1".into(),
            name: "Alice".into(),
            public_hash: "0xabc".into(),
        };
        store.create_account(&account).await.unwrap();
        assert_eq!(store.get_account("a1").await.unwrap(), Some(account.clone()));
        assert_eq!(store.get_account("missing").await.unwrap(), None);
        assert!(store.create_account(&account).await.is_err());
    }
}
