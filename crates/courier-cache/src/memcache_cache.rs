//! Memcache-based cache implementation.
//!
//! The `memcache` client is synchronous, so every call runs on tokio's
//! blocking pool. Values are stored as JSON bytes with expiration zero.

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::record::{self, MultipleDataRecord, SingleDataRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

const BACKEND: &str = "memcache";

/// Memcache-backed cache.
pub struct MemcacheCache {
    /// Connection URL (`memcache://host:port`).
    url: String,
    /// Shared client, created on first use.
    client: OnceCell<Arc<memcache::Client>>,
}

impl MemcacheCache {
    /// Create a Memcache cache for `host:port`.
    ///
    /// Like the Redis adapter, the connection is deferred to the first
    /// operation.
    pub fn new(host: &str, port: u16) -> CacheResult<Self> {
        if host.trim().is_empty() {
            return Err(CacheError::Configuration("Memcache host cannot be empty".to_string()));
        }

        Ok(Self {
            url: format!("memcache://{}:{}", host, port),
            client: OnceCell::new(),
        })
    }

    /// The connection URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn client(&self) -> CacheResult<Arc<memcache::Client>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let url = self.url.clone();
                debug!(url = %url, "Connecting to Memcache");
                let client = run_blocking(move || {
                    memcache::Client::connect(url.as_str())
                        .map_err(|e| CacheError::Connection(format!("Failed to connect to Memcache at {}: {}", url, e)))
                })
                .await?;
                CacheMetrics::connection_opened(BACKEND);
                Ok::<_, CacheError>(Arc::new(client))
            })
            .await?;
        Ok(Arc::clone(client))
    }

    async fn set_bytes(&self, key: &str, bytes: Vec<u8>) -> CacheResult<()> {
        let client = self.client().await?;
        let owned_key = key.to_string();
        run_blocking(move || {
            client
                .set(&owned_key, bytes.as_slice(), 0)
                .map_err(|e| backend_error(&e))
        })
        .await?;
        debug!(key = %key, "Cached key in Memcache");
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> CacheResult<Vec<u8>> {
        let client = self.client().await?;
        let owned_key = key.to_string();
        let value = run_blocking(move || {
            client
                .get::<Vec<u8>>(&owned_key)
                .map_err(|e| backend_error(&e))
        })
        .await?;

        value.ok_or_else(|| {
            debug!(key = %key, "Cache miss");
            CacheError::not_found(key)
        })
    }
}

fn backend_error(err: &memcache::MemcacheError) -> CacheError {
    CacheError::Backend {
        backend: BACKEND,
        message: err.to_string(),
    }
}

/// Run a blocking memcache call off the async runtime.
async fn run_blocking<T, F>(f: F) -> CacheResult<T>
where
    F: FnOnce() -> CacheResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| CacheError::Backend {
        backend: BACKEND,
        message: format!("blocking task failed: {}", e),
    })?
}

#[async_trait]
impl Cache for MemcacheCache {
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

impl std::fmt::Debug for MemcacheCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcacheCache")
            .field("url", &self.url)
            .field("connected", &self.client.initialized())
            .finish()
    }
}
