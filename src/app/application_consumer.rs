//! The Application Consumer: feeds intents from the event channel into the engine.
//!
//! Every outcome is logged and the message is dropped. `Rejected` and
//! `AlreadyApplied` are final; `Failed` relies on the channel redelivering.

use crate::app::application_engine::ApplicationEngine;
use crate::domain::model::{ApplyOutcome, TransactionRequested};
use crate::infra::ids;
use crate::transport::events::Subscription;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Clone)]
pub struct ApplicationConsumer {
    engine: Arc<ApplicationEngine>,
    concurrency: usize,
}

/// Counts of what a consumer run did, returned when the subscription ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub applied: u64,
    pub already_applied: u64,
    pub rejected: u64,
    pub failed: u64,
    pub invalid: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: Option<&ApplyOutcome>) {
        match outcome {
            Some(ApplyOutcome::Applied) => self.applied += 1,
            Some(ApplyOutcome::AlreadyApplied) => self.already_applied += 1,
            Some(ApplyOutcome::Rejected(_)) => self.rejected += 1,
            Some(ApplyOutcome::Failed(_)) => self.failed += 1,
            None => self.invalid += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.applied + self.already_applied + self.rejected + self.failed + self.invalid
    }
}

impl ApplicationConsumer {
    pub fn new(engine: Arc<ApplicationEngine>) -> Self {
        Self {
            engine,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Consumes until the subscription ends, then waits for in-flight applications.
    pub async fn run(&self, mut subscription: Subscription) -> ConsumerStats {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight: JoinSet<Option<ApplyOutcome>> = JoinSet::new();
        let mut stats = ConsumerStats::default();

        info!(concurrency = self.concurrency, "consumer running");

        while let Some(payload) = subscription.next_message().await {
            let permit = match permits.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let consumer = self.clone();
            in_flight.spawn(async move {
                let outcome = consumer.handle_message(&payload).await;
                drop(permit);
                outcome
            });

            // Reap finished tasks so the set does not grow with the stream.
            while let Some(done) = in_flight.try_join_next() {
                stats.record(joined(done).as_ref());
            }
        }

        while let Some(done) = in_flight.join_next().await {
            stats.record(joined(done).as_ref());
        }

        info!(?stats, "subscription ended, consumer stopped");
        stats
    }

    /// Decodes one message and applies it. `None` means the message was unusable.
    pub async fn handle_message(&self, payload: &[u8]) -> Option<ApplyOutcome> {
        let event = match TransactionRequested::from_json_bytes(payload) {
            Ok(e) => e,
            Err(e) => {
                error!(error = %e, "bad event: undecodable payload dropped");
                return None;
            }
        };
        if let Err(e) = event.validate() {
            error!(event_id = %event.event_id, error = %e, "bad event: invalid intent dropped");
            return None;
        }

        let entry_id = ids::rand_id();
        let outcome = self
            .engine
            .apply(&event.account_id, &event.idempotency_key, &entry_id, event.amount)
            .await;
        log_outcome(&event, &entry_id, &outcome);
        Some(outcome)
    }
}

fn joined(
    result: Result<Option<ApplyOutcome>, tokio::task::JoinError>,
) -> Option<ApplyOutcome> {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "apply task panicked or was cancelled");
            Some(ApplyOutcome::Failed(e.to_string()))
        }
    }
}

fn log_outcome(event: &TransactionRequested, entry_id: &str, outcome: &ApplyOutcome) {
    match outcome {
        ApplyOutcome::Applied => info!(
            event_id = %event.event_id,
            account_id = %event.account_id,
            idempotency_key = %event.idempotency_key,
            entry_id = %entry_id,
            amount = event.amount,
            outcome = outcome.label(),
            "applied"
        ),
        ApplyOutcome::AlreadyApplied => info!(
            event_id = %event.event_id,
            account_id = %event.account_id,
            idempotency_key = %event.idempotency_key,
            outcome = outcome.label(),
            "redelivered intent ignored"
        ),
        ApplyOutcome::Rejected(reason) => warn!(
            event_id = %event.event_id,
            account_id = %event.account_id,
            idempotency_key = %event.idempotency_key,
            amount = event.amount,
            outcome = outcome.label(),
            %reason,
            "rejected"
        ),
        ApplyOutcome::Failed(msg) => error!(
            event_id = %event.event_id,
            account_id = %event.account_id,
            idempotency_key = %event.idempotency_key,
            amount = event.amount,
            outcome = outcome.label(),
            error = %msg,
            "apply error"
        ),
    }
}
