//! Per-operation deadline decorator.

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::record::{MultipleDataRecord, SingleDataRecord};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounds every operation of the wrapped cache by a fixed deadline.
///
/// On expiry the in-flight backend future is dropped and the caller gets
/// [`CacheError::Timeout`]. Nothing is retried.
#[derive(Debug)]
pub struct TimeoutCache<C> {
    inner: C,
    timeout: Duration,
}

impl<C: Cache> TimeoutCache<C> {
    /// Wrap `inner` with a per-operation deadline.
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The configured deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Borrow the wrapped cache.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn bounded<T, Fut>(&self, operation: &'static str, key: &str, fut: Fut) -> CacheResult<T>
    where
        Fut: Future<Output = CacheResult<T>> + Send,
    {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
            warn!(
                backend = %self.inner.backend_name(),
                operation,
                key = %key,
                timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                "Cache operation timed out"
            );
            CacheError::Timeout {
                operation,
                key: key.to_string(),
                timeout: self.timeout,
            }
        })?
    }
}

#[async_trait]
impl<C: Cache> Cache for TimeoutCache<C> {
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()> {
        self.bounded("set_single", key, self.inner.set_single(key, value)).await
    }

    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord> {
        self.bounded("get_single", key, self.inner.get_single(key)).await
    }

    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()> {
        self.bounded("set_multiple", key, self.inner.set_multiple(key, values)).await
    }

    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord> {
        self.bounded("get_multiple", key, self.inner.get_multiple(key)).await
    }

    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
}
