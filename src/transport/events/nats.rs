//! NATS-backed event channel.
//!
//! Intents are published on one subject. Workers join a queue group, so each intent
//! is handed to one worker. Publishing flushes before returning so the gateway only
//! acknowledges intents the server has received.

use super::{ChannelError, EventChannel, Subscription};
use crate::domain::model::TransactionRequested;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

#[derive(Clone)]
pub struct NatsChannel {
    client: async_nats::Client,
    subject: String,
    queue_group: String,
}

impl NatsChannel {
    pub async fn connect(url: &str, subject: &str, queue_group: &str) -> Result<Self, ChannelError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        info!(nats_url = %url, subject = %subject, "connected to NATS");
        Ok(Self {
            client,
            subject: subject.to_string(),
            queue_group: queue_group.to_string(),
        })
    }
}

#[async_trait]
impl EventChannel for NatsChannel {
    async fn publish(&self, event: &TransactionRequested) -> Result<(), ChannelError> {
        let payload = event.to_json_bytes()?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| ChannelError::Publish(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| ChannelError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription, ChannelError> {
        let subscriber = self
            .client
            .queue_subscribe(self.subject.clone(), self.queue_group.clone())
            .await
            .map_err(|e| ChannelError::Subscribe(e.to_string()))?;
        info!(subject = %self.subject, queue_group = %self.queue_group, "subscribed");
        let stream = subscriber.map(|msg| msg.payload.to_vec());
        Ok(Subscription::new(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Runs only against a live server: TEST_NATS_URL=nats://localhost:4222
    #[tokio::test]
    async fn publish_reaches_queue_subscriber() {
        let Ok(url) = std::env::var("TEST_NATS_URL") else {
            return;
        };
        let subject = format!("tx.created.test.{}", uuid::Uuid::new_v4());
        let channel = NatsChannel::connect(&url, &subject, "ledger-test").await.unwrap();
        let mut sub = channel.subscribe().await.unwrap();

        let event = TransactionRequested {
            event_id: "evt-nats".into(),
            account_id: "acct".into(),
            amount: 7,
            idempotency_key: "k-nats".into(),
        };
        channel.publish(&event).await.unwrap();

        let payload = tokio::time::timeout(std::time::Duration::from_secs(5), sub.next_message())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(TransactionRequested::from_json_bytes(&payload).unwrap(), event);
    }
}
