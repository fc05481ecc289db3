//! Event Channel: at-least-once transport of transaction intents from the gateway
//! to the consumer.
//!
//! Payloads are the JSON encoding of [`TransactionRequested`]. Subscribers receive raw
//! bytes and decode them themselves, since the channel may carry messages this crate
//! did not produce.

pub mod memory;
pub mod nats;

use crate::domain::model::TransactionRequested;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

pub use memory::InMemoryChannel;
pub use nats::NatsChannel;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to connect to event channel: {0}")]
    Connect(String),

    #[error("failed to publish event: {0}")]
    Publish(String),

    #[error("failed to subscribe: {0}")]
    Subscribe(String),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("channel closed")]
    Closed,
}

/// A stream of raw message payloads. Ends when the channel is closed.
pub struct Subscription {
    inner: BoxStream<'static, Vec<u8>>,
}

impl Subscription {
    pub fn new(inner: BoxStream<'static, Vec<u8>>) -> Self {
        Self { inner }
    }

    /// Next payload, or `None` once the channel has closed and drained.
    pub async fn next_message(&mut self) -> Option<Vec<u8>> {
        self.inner.next().await
    }
}

#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Hands the intent to the transport. Returns once the transport accepted it;
    /// says nothing about whether it has been applied.
    async fn publish(&self, event: &TransactionRequested) -> Result<(), ChannelError>;

    /// Joins the consumers of transaction intents. Consumers compete: each message
    /// goes to one of them (redelivery aside).
    async fn subscribe(&self) -> Result<Subscription, ChannelError>;
}
