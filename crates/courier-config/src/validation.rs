//! Configuration validation.
//!
//! Collects every problem in one pass so a bad deployment fails fast with
//! the complete list instead of one error per restart.

use crate::{BrokerConfig, CacheConfig, CourierConfig};
use std::fmt;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// A host name is empty.
    EmptyHost { name: String },
    /// Port number is invalid (must be 1-65535).
    InvalidPort { name: String, value: u16 },
    /// Producer and discovery ports are the same.
    PortConflict { tcp: u16, http: u16 },
    /// Channel name is empty or too long.
    InvalidChannel { value: String },
    /// Timeout value must be positive.
    NonPositiveTimeout { name: String },
    /// Concurrency limit must be positive.
    ZeroMaxInFlight,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyHost { name } => write!(f, "Host for {} cannot be empty", name),
            Self::InvalidPort { name, value } => {
                write!(f, "Invalid port for {}: {} (must be 1-65535)", name, value)
            }
            Self::PortConflict { tcp, http } => {
                write!(
                    f,
                    "Broker TCP port ({}) and discovery HTTP port ({}) cannot be the same",
                    tcp, http
                )
            }
            Self::InvalidChannel { value } => {
                write!(f, "Invalid channel name: '{}' (must be 1-64 characters)", value)
            }
            Self::NonPositiveTimeout { name } => write!(f, "Timeout '{}' must be positive", name),
            Self::ZeroMaxInFlight => write!(f, "broker.max_in_flight must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum channel name length accepted by NSQ.
    const MAX_CHANNEL_LENGTH: usize = 64;

    /// Validates the entire configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &CourierConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_cache(&config.cache, &mut errors);
        Self::validate_broker(&config.broker, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_cache(config: &CacheConfig, errors: &mut Vec<ConfigValidationError>) {
        // The in-process backend has no address.
        if config.backend == crate::CacheBackendKind::Memory {
            return;
        }

        if config.host.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyHost {
                name: "cache".to_string(),
            });
        }
        if config.port == 0 {
            errors.push(ConfigValidationError::InvalidPort {
                name: "cache.port".to_string(),
                value: config.port,
            });
        }
    }

    fn validate_broker(config: &BrokerConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.host.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyHost {
                name: "broker".to_string(),
            });
        }
        if config.tcp_port == 0 {
            errors.push(ConfigValidationError::InvalidPort {
                name: "broker.tcp_port".to_string(),
                value: config.tcp_port,
            });
        }
        if config.http_port == 0 {
            errors.push(ConfigValidationError::InvalidPort {
                name: "broker.http_port".to_string(),
                value: config.http_port,
            });
        }
        if config.tcp_port != 0 && config.tcp_port == config.http_port {
            errors.push(ConfigValidationError::PortConflict {
                tcp: config.tcp_port,
                http: config.http_port,
            });
        }
        if config.channel.is_empty() || config.channel.len() > Self::MAX_CHANNEL_LENGTH {
            errors.push(ConfigValidationError::InvalidChannel {
                value: config.channel.clone(),
            });
        }
        if config.handler_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "broker.handler_timeout_secs".to_string(),
            });
        }
        if config.publish_timeout_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "broker.publish_timeout_ms".to_string(),
            });
        }
        if config.max_in_flight == 0 {
            errors.push(ConfigValidationError::ZeroMaxInFlight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheBackendKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::validate(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = CourierConfig::default();
        config.cache.host = String::new();
        config.broker.max_in_flight = 0;
        config.broker.handler_timeout_secs = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ConfigValidationError::ZeroMaxInFlight));
        assert!(errors.contains(&ConfigValidationError::EmptyHost {
            name: "cache".to_string()
        }));
    }

    #[test]
    fn test_memory_backend_skips_address_checks() {
        let mut config = CourierConfig::default();
        config.cache.backend = CacheBackendKind::Memory;
        config.cache.host = String::new();
        config.cache.port = 0;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_port_conflict() {
        let mut config = CourierConfig::default();
        config.broker.http_port = config.broker.tcp_port;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(errors[0], ConfigValidationError::PortConflict { .. }));
    }

    #[test]
    fn test_channel_too_long() {
        let mut config = CourierConfig::default();
        config.broker.channel = "c".repeat(65);
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors[0].to_string().contains("Invalid channel name"));
    }
}
