//! Outbound messages and topic naming rules.

use crate::error::{BrokerError, BrokerResult};
use serde::Serialize;

/// Longest topic or channel name the broker accepts.
pub const MAX_NAME_LEN: usize = 64;

const EPHEMERAL_SUFFIX: &str = "#ephemeral";

/// A message to publish: a topic plus opaque payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Destination topic.
    pub topic: String,
    /// Payload, delivered to consumers unchanged.
    pub payload: Vec<u8>,
}

impl MessageEvent {
    /// Create an event from raw bytes.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Create an event whose payload is the JSON encoding of `value`.
    pub fn json<T: Serialize>(topic: impl Into<String>, value: &T) -> BrokerResult<Self> {
        let topic = topic.into();
        let payload = serde_json::to_vec(value).map_err(|e| BrokerError::Publish {
            topic: topic.clone(),
            message: format!("failed to encode payload: {}", e),
        })?;
        Ok(Self { topic, payload })
    }
}

/// Check a topic name against the broker's naming rules: 1 to 64 characters
/// from `[.a-zA-Z0-9_-]`, optionally ending in `#ephemeral`.
pub fn validate_topic(name: &str) -> BrokerResult<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(BrokerError::InvalidTopic(name.to_string()))
    }
}

/// Check a channel name; channels follow the same rules as topics.
pub fn validate_channel(name: &str) -> BrokerResult<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(BrokerError::Configuration(format!("invalid channel name '{}'", name)))
    }
}

fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    let base = name.strip_suffix(EPHEMERAL_SUFFIX).unwrap_or(name);
    !base.is_empty()
        && base
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}
