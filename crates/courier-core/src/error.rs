//! Unified error type shared by every Courier crate.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Top-level error type for Courier.
///
/// The cache and broker crates carry their own detailed error enums and
/// convert into this type at the application boundary, so that bootstrap
/// code (configuration, logging, wiring) can surface a single error type.
#[derive(Error, Debug)]
pub enum CourierError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cache layer error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Cache key was not present in the backend
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Message broker error
    #[error("Broker error: {0}")]
    Broker(String),

    /// Connection to a backend or discovery service failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CourierError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::KeyNotFound(_) => "KEY_NOT_FOUND",
            Self::Broker(_) => "BROKER_ERROR",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if the caller may reasonably retry the failed operation.
    ///
    /// Nothing in Courier retries on its own; this only informs caller policy.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_) | Self::Broker(_))
    }
}

impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

/// Serializable error summary, suitable for structured logs or health output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response from a `CourierError`.
    #[must_use]
    pub fn from_error(error: &CourierError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<&CourierError> for ErrorResponse {
    fn from(error: &CourierError) -> Self {
        Self::from_error(error)
    }
}
