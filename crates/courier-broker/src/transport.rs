//! Seam between the broker client and a concrete messaging system.

use crate::error::BrokerResult;
use async_trait::async_trait;
use std::time::Duration;

/// A messaging system the client can publish to and subscribe on.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Stream of messages for one subscription.
    type Source: MessageSource;

    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Send `payload` to `topic`, returning once the broker acknowledged it.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BrokerResult<()>;

    /// Verify the discovery service is reachable.
    async fn probe(&self) -> BrokerResult<()>;

    /// Subscribe to `topic` on `channel`.
    async fn subscribe(&self, topic: &str, channel: &str, max_in_flight: usize) -> BrokerResult<Self::Source>;
}

/// Stream of inbound messages for one subscription.
#[async_trait]
pub trait MessageSource: Send + 'static {
    /// Message type yielded by this source.
    type Message: InboundMessage;

    /// Wait for the next message. `None` means the subscription has ended.
    async fn next_message(&mut self) -> Option<Self::Message>;
}

/// A received message awaiting acknowledgement.
#[async_trait]
pub trait InboundMessage: Send + 'static {
    /// Raw payload.
    fn body(&self) -> &[u8];

    /// Delivery attempt, starting at 1.
    fn attempts(&self) -> u16;

    /// Acknowledge successful processing.
    async fn finish(self);

    /// Return the message to the broker for redelivery after `delay`.
    async fn requeue(self, delay: Duration);
}
