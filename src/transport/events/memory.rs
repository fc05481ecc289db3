//! In-process event channel for single-process deployments and tests.
//!
//! Backed by an unbounded tokio mpsc queue. All subscriptions pull from the same
//! receiver, which gives queue-group semantics. Nothing is dropped on the floor:
//! a message stays queued until some subscriber takes it.

use super::{ChannelError, EventChannel, Subscription};
use crate::domain::model::TransactionRequested;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

type SharedReceiver = Arc<tokio::sync::Mutex<UnboundedReceiver<Vec<u8>>>>;

pub struct InMemoryChannel {
    sender: Mutex<Option<UnboundedSender<Vec<u8>>>>,
    receiver: SharedReceiver,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }

    /// Publishes an arbitrary payload. Lets callers inject messages from foreign producers.
    pub fn publish_raw(&self, payload: Vec<u8>) -> Result<(), ChannelError> {
        let guard = self.sender.lock().map_err(|_| ChannelError::Closed)?;
        let sender = guard.as_ref().ok_or(ChannelError::Closed)?;
        sender.send(payload).map_err(|_| ChannelError::Closed)
    }

    /// Stops accepting publishes. Subscriptions end once the queued messages are drained.
    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventChannel for InMemoryChannel {
    async fn publish(&self, event: &TransactionRequested) -> Result<(), ChannelError> {
        let payload = event.to_json_bytes()?;
        self.publish_raw(payload)
    }

    async fn subscribe(&self) -> Result<Subscription, ChannelError> {
        let receiver = self.receiver.clone();
        let stream = futures::stream::unfold(receiver, |rx| async move {
            let msg = rx.lock().await.recv().await?;
            Some((msg, rx))
        });
        Ok(Subscription::new(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(key: &str) -> TransactionRequested {
        TransactionRequested {
            event_id: format!("evt-{}", key),
            account_id: "acct".into(),
            amount: 5,
            idempotency_key: key.into(),
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order_then_ends_after_close() {
        let channel = InMemoryChannel::new();
        let mut sub = channel.subscribe().await.unwrap();

        channel.publish(&intent("k1")).await.unwrap();
        channel.publish(&intent("k2")).await.unwrap();
        channel.close();

        let first = TransactionRequested::from_json_bytes(&sub.next_message().await.unwrap()).unwrap();
        let second = TransactionRequested::from_json_bytes(&sub.next_message().await.unwrap()).unwrap();
        assert_eq!(first.idempotency_key, "k1");
        assert_eq!(second.idempotency_key, "k2");
        assert!(sub.next_message().await.is_none());
    }

    #[tokio::test]
    async fn publish_after_close_fails() {
        let channel = InMemoryChannel::new();
        channel.close();
        assert!(matches!(
            channel.publish(&intent("k1")).await,
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn subscribers_compete_for_messages() {
        let channel = InMemoryChannel::new();
        let mut a = channel.subscribe().await.unwrap();
        let mut b = channel.subscribe().await.unwrap();

        channel.publish(&intent("k1")).await.unwrap();
        channel.publish(&intent("k2")).await.unwrap();
        channel.close();

        let mut seen = Vec::new();
        if let Some(m) = a.next_message().await {
            seen.push(m);
        }
        if let Some(m) = b.next_message().await {
            seen.push(m);
        }
        assert_eq!(seen.len(), 2);
        assert!(a.next_message().await.is_none());
        assert!(b.next_message().await.is_none());
    }
}
