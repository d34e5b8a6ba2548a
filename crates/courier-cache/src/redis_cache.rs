//! Redis-based cache implementation.

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::record::{self, MultipleDataRecord, SingleDataRecord};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::OnceCell;
use tracing::debug;

const BACKEND: &str = "redis";

/// Redis-backed cache.
///
/// Uses database zero with no authentication or TLS. The connection is
/// established lazily on first use and then shared by every caller through a
/// single multiplexed [`ConnectionManager`].
pub struct RedisCache {
    /// Redis client (connection factory).
    client: Client,
    /// Shared connection, created on first use.
    conn: OnceCell<ConnectionManager>,
    /// `host:port` for diagnostics.
    address: String,
}

impl RedisCache {
    /// Create a Redis cache for `host:port`.
    ///
    /// No network I/O happens here; an unreachable server surfaces as
    /// [`CacheError::Connection`] on the first operation.
    pub fn new(host: &str, port: u16) -> CacheResult<Self> {
        let address = format!("{}:{}", host, port);
        let client = Client::open(format!("redis://{}/0", address))
            .map_err(|e| CacheError::Configuration(format!("Invalid Redis address '{}': {}", address, e)))?;

        Ok(Self {
            client,
            conn: OnceCell::new(),
            address,
        })
    }

    /// The `host:port` this cache talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Get the shared connection, connecting on first use.
    async fn conn(&self) -> CacheResult<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!(address = %self.address, "Connecting to Redis");
                let conn = ConnectionManager::new(self.client.clone()).await.map_err(|e| {
                    CacheError::Connection(format!("Failed to connect to Redis at {}: {}", self.address, e))
                })?;
                CacheMetrics::connection_opened(BACKEND);
                Ok::<_, CacheError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }

    async fn set_bytes(&self, key: &str, bytes: Vec<u8>) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        // Plain SET: no expiration.
        conn.set::<_, _, ()>(key, bytes).await?;
        debug!(key = %key, "Cached key in Redis");
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> CacheResult<Vec<u8>> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;

        match value {
            Some(bytes) => {
                debug!(key = %key, "Cache hit");
                Ok(bytes)
            }
            None => {
                debug!(key = %key, "Cache miss");
                Err(CacheError::not_found(key))
            }
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()> {
        let bytes = record::encode_single(key, value)?;
        self.set_bytes(key, bytes).await
    }

    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord> {
        let bytes = self.get_bytes(key).await?;
        record::decode_single(key, &bytes)
    }

    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()> {
        let bytes = record::encode_multiple(key, values)?;
        self.set_bytes(key, bytes).await
    }

    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord> {
        let bytes = self.get_bytes(key).await?;
        record::decode_multiple(key, &bytes)
    }

    fn backend_name(&self) -> &str {
        BACKEND
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("address", &self.address)
            .field("connected", &self.conn.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_lazy() {
        // Port 1 is never a Redis server; construction must still succeed.
        let cache = RedisCache::new("127.0.0.1", 1).unwrap();
        assert_eq!(cache.address(), "127.0.0.1:1");
        assert_eq!(cache.backend_name(), "redis");
        assert!(format!("{:?}", cache).contains("connected: false"));
    }
}
