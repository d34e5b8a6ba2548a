//! Cache error types.

use courier_core::CourierError;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A record could not be encoded for storage.
    #[error("Failed to serialize value for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored bytes do not match the expected record shape.
    #[error("Failed to deserialize value for key '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The key was never written or has been evicted.
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// Could not reach the backend.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Any other backend failure.
    #[error("{backend} error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    /// Operation exceeded its deadline.
    #[error("Cache operation '{operation}' on key '{key}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        key: String,
        timeout: Duration,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Creates a key-not-found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Returns true if the key was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serialization { .. } => "serialization",
            Self::Deserialization { .. } => "deserialization",
            Self::KeyNotFound { .. } => "not_found",
            Self::Connection(_) => "connection",
            Self::Redis(_) => "redis",
            Self::Backend { .. } => "backend",
            Self::Timeout { .. } => "timeout",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns true if a caller-side retry may succeed.
    ///
    /// Nothing in this crate retries; the decision stays with the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout { .. } | Self::Backend { .. } => true,
            Self::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            _ => false,
        }
    }
}

impl From<CacheError> for CourierError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::KeyNotFound { key } => CourierError::KeyNotFound(key),
            CacheError::Connection(message) => CourierError::Connection(message),
            CacheError::Configuration(message) => CourierError::Configuration(message),
            e @ CacheError::Timeout { .. } => CourierError::Timeout(e.to_string()),
            e => CourierError::Cache(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{").unwrap_err()
    }

    #[test]
    fn test_not_found() {
        let err = CacheError::not_found("user:1");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Key not found: user:1");
    }

    #[test]
    fn test_serialization_errors_are_not_retryable() {
        let err = CacheError::Deserialization {
            key: "k".into(),
            source: json_error(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("deserialize"));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = CacheError::Timeout {
            operation: "get_single",
            key: "k".into(),
            timeout: Duration::from_millis(10),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_into_courier_error() {
        let courier: CourierError = CacheError::not_found("order:42").into();
        assert!(matches!(courier, CourierError::KeyNotFound(key) if key == "order:42"));

        let courier: CourierError = CacheError::Connection("refused".into()).into();
        assert!(matches!(courier, CourierError::Connection(_)));

        let courier: CourierError = CacheError::Backend {
            backend: "memcache",
            message: "server error".into(),
        }
        .into();
        assert!(matches!(courier, CourierError::Cache(msg) if msg.contains("memcache")));
    }
}
