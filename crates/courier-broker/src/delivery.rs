//! Inbound deliveries and the handler signature.

use crate::error::{BrokerError, BrokerResult};
use crate::scope::ExecutionScope;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// One message handed to a handler.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Topic the message was delivered on.
    pub topic: String,
    /// Payload decoded as UTF-8; invalid sequences are replaced.
    pub body: String,
    /// Delivery attempt, starting at 1.
    pub attempts: u16,
    /// Cancellation and deadline for this invocation.
    pub scope: ExecutionScope,
}

impl Delivery {
    /// Returns the body if this delivery belongs to `topic`.
    pub fn consume(&self, topic: &str) -> BrokerResult<String> {
        if self.topic == topic {
            Ok(self.body.clone())
        } else {
            Err(BrokerError::ConsumeMissing {
                topic: topic.to_string(),
            })
        }
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> BrokerResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Result of a handler invocation. `Err` requeues the message.
pub type HandlerResult = Result<(), BrokerError>;

/// Message handler function type.
pub type MessageHandler = Arc<dyn Fn(Delivery) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Box an async closure into a [`MessageHandler`].
pub fn handler_fn<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |delivery| Box::pin(f(delivery)))
}
