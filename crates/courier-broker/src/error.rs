//! Broker error types.

use courier_core::CourierError;
use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Broker-related errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The producer could not hand the message to the broker.
    #[error("Failed to publish to topic '{topic}': {message}")]
    Publish { topic: String, message: String },

    /// The broker or its discovery service is unreachable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No message was delivered for the requested topic.
    #[error("failed to consume the topic {topic}")]
    ConsumeMissing { topic: String },

    /// Topic or channel name rejected by the broker's naming rules.
    #[error("Invalid topic name '{0}'")]
    InvalidTopic(String),

    /// A message handler reported failure.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The client has been shut down.
    #[error("Broker client is shut down")]
    Shutdown,
}

impl BrokerError {
    /// Creates a handler error from anything displayable.
    pub fn handler(message: impl std::fmt::Display) -> Self {
        Self::Handler(message.to_string())
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::Publish { .. } | BrokerError::Connection(_) | BrokerError::Handler(_)
        )
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Handler(format!("invalid message body: {}", err))
    }
}

impl From<BrokerError> for CourierError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Connection(message) => CourierError::Connection(message),
            BrokerError::Configuration(message) => CourierError::Configuration(message),
            e => CourierError::Broker(e.to_string()),
        }
    }
}
