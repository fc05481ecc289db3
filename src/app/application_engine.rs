//! The Application Engine.
//!
//! Applies a transaction intent at most once and never lets an account balance go
//! negative, although the intent itself may be delivered any number of times.
//!
//! One call to [`ApplicationEngine::apply`] is one atomic unit of work:
//! 1.  insert the idempotency key into the consumed token set; a duplicate means the
//!     intent was already applied and the call is a no-op;
//! 2.  sum the committed entries of the account and refuse if the amount would take
//!     the balance below zero or past `i64::MAX` (the token insert is rolled back with
//!     it, so the key can be reused);
//! 3.  insert the entry;
//! 4.  commit.
//!
//! The token and the entry land together or not at all. Debits on one account are
//! serialized by an in-process lock taken before step 1 and released after
//! commit/abort, plus whatever cross-process lock the store provides.

use crate::domain::model::{ApplyOutcome, NewEntry, RejectReason};
use crate::storage::ledger::{AtomicUnit, LedgerStore, StoreError, TokenInsert};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-account async mutexes. Entries are dropped again once nobody holds or waits on them.
#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held for the duration of one unit of work on an account.
pub struct AccountGuard<'a> {
    owner: &'a AccountLocks,
    account_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, account_id: &str) -> AccountGuard<'_> {
        // Clone the Arc out first; the DashMap shard lock must not be held across the await.
        let lock = self
            .locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        AccountGuard {
            owner: self,
            account_id: account_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of accounts with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map itself still references the mutex: nobody holds or waits on it.
        self.owner
            .locks
            .remove_if(&self.account_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Outcome of steps 1-3, before the unit is committed or aborted.
enum Decision {
    Write,
    Duplicate,
    Insufficient { balance: i64 },
    Overflow { balance: i64 },
}

pub struct ApplicationEngine {
    store: Arc<dyn LedgerStore>,
    locks: AccountLocks,
    timeout: Duration,
}

impl ApplicationEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            locks: AccountLocks::new(),
            timeout: DEFAULT_APPLY_TIMEOUT,
        }
    }

    /// Upper bound on one unit of work. When it elapses the unit is dropped
    /// (rolled back) and the call reports `Failed`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    /// Applies one transaction intent. Never errors: store failures become `Failed`.
    #[instrument(skip(self), fields(outcome))]
    pub async fn apply(
        &self,
        account_id: &str,
        idempotency_key: &str,
        entry_id: &str,
        amount: i64,
    ) -> ApplyOutcome {
        let _account = self.locks.acquire(account_id).await;

        let entry = NewEntry {
            id: entry_id.to_string(),
            account_id: account_id.to_string(),
            amount,
        };

        let outcome = match tokio::time::timeout(self.timeout, self.run_unit(idempotency_key, &entry)).await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => ApplyOutcome::Failed(e.to_string()),
            Err(_) => ApplyOutcome::Failed(StoreError::Timeout(self.timeout).to_string()),
        };

        tracing::Span::current().record("outcome", outcome.label());
        outcome
    }

    async fn run_unit(&self, idempotency_key: &str, entry: &NewEntry) -> Result<ApplyOutcome, StoreError> {
        let mut unit = self.store.begin().await?;

        let decision = match decide(unit.as_mut(), idempotency_key, entry).await {
            Ok(d) => d,
            Err(e) => {
                abort_quietly(unit.as_mut()).await;
                return Err(e);
            }
        };

        match decision {
            Decision::Duplicate => {
                abort_quietly(unit.as_mut()).await;
                debug!("idempotency key already consumed");
                Ok(ApplyOutcome::AlreadyApplied)
            }
            Decision::Insufficient { balance } => {
                abort_quietly(unit.as_mut()).await;
                debug!(balance, "debit exceeds balance");
                Ok(ApplyOutcome::Rejected(RejectReason::InsufficientFunds))
            }
            Decision::Overflow { balance } => {
                abort_quietly(unit.as_mut()).await;
                warn!(balance, amount = entry.amount, "credit would overflow the balance");
                Ok(ApplyOutcome::Rejected(RejectReason::BalanceOverflow))
            }
            Decision::Write => {
                unit.commit().await?;
                Ok(ApplyOutcome::Applied)
            }
        }
    }
}

async fn decide(
    unit: &mut dyn AtomicUnit,
    idempotency_key: &str,
    entry: &NewEntry,
) -> Result<Decision, StoreError> {
    unit.lock_account(&entry.account_id).await?;

    if unit.insert_token(idempotency_key).await? == TokenInsert::Duplicate {
        return Ok(Decision::Duplicate);
    }

    // Credits are checked too: a committed sum past i64::MAX could never be read back.
    let balance = unit.sum_entries(&entry.account_id).await?;
    match balance.checked_add(entry.amount) {
        None => return Ok(Decision::Overflow { balance }),
        // A debit down to exactly zero is allowed.
        Some(after) if after < 0 => return Ok(Decision::Insufficient { balance }),
        Some(_) => {}
    }

    unit.insert_entry(entry).await?;
    Ok(Decision::Write)
}

async fn abort_quietly(unit: &mut dyn AtomicUnit) {
    if let Err(e) = unit.abort().await {
        // The transaction is discarded server-side when the connection drops it.
        warn!(error = %e, "abort failed");
    }
}
