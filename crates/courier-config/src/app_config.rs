//! Configuration structures.

use courier_core::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    /// Cache backend configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Message broker configuration.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which key-value store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Redis, database zero.
    #[default]
    Redis,
    /// Memcached.
    Memcache,
    /// In-process map, for tests and local development.
    Memory,
}

impl fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::Memcache => write!(f, "memcache"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend selected at construction time.
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// Backend host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Backend port.
    #[serde(default = "default_cache_port")]
    pub port: u16,

    /// Per-operation deadline in milliseconds (0 = no deadline).
    #[serde(default)]
    pub operation_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            host: default_host(),
            port: default_cache_port(),
            operation_timeout_ms: 0,
        }
    }
}

impl CacheConfig {
    /// Returns the `host:port` address of the backend.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the per-operation deadline, if one is configured.
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_ms > 0).then(|| Duration::from_millis(self.operation_timeout_ms))
    }
}

/// Message broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker host.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port of the broker daemon (producer connection).
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    /// HTTP port of the discovery service.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Channel every registered consumer subscribes on.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Deadline bounding each handler invocation, in seconds.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,

    /// Maximum number of messages processed concurrently per consumer.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Deadline for a publish to be acknowledged, in milliseconds.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_ms: u64,

    /// Deliveries after which a failing message is dropped (0 = never).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            tcp_port: default_tcp_port(),
            http_port: default_http_port(),
            channel: default_channel(),
            handler_timeout_secs: default_handler_timeout(),
            max_in_flight: default_max_in_flight(),
            publish_timeout_ms: default_publish_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl BrokerConfig {
    /// Producer address (`host:tcp_port`).
    #[must_use]
    pub fn producer_address(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }

    /// Discovery service address (`host:http_port`).
    #[must_use]
    pub fn lookupd_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// Handler deadline as a `Duration`.
    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    /// Publish acknowledgement deadline as a `Duration`.
    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_cache_port() -> u16 {
    6379
}

fn default_tcp_port() -> u16 {
    4150
}

fn default_http_port() -> u16 {
    4161
}

fn default_channel() -> String {
    "channel".to_string()
}

fn default_handler_timeout() -> u64 {
    30
}

fn default_max_in_flight() -> usize {
    16
}

fn default_publish_timeout() -> u64 {
    5_000
}

fn default_max_attempts() -> u16 {
    5
}
