//! Metrics and tracing decorator.

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::record::{MultipleDataRecord, SingleDataRecord};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

/// Records operation counts, latency, hits, misses and errors for the
/// wrapped cache, labeled by its backend name.
///
/// A miss is not an error: `KeyNotFound` increments the miss counter only.
#[derive(Debug)]
pub struct InstrumentedCache<C> {
    inner: C,
}

impl<C: Cache> InstrumentedCache<C> {
    /// Wrap `inner`.
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped cache.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn observe<T>(&self, operation: &'static str, key: &str, started: Instant, result: &CacheResult<T>) {
        let backend = self.inner.backend_name();
        let elapsed = started.elapsed();
        CacheMetrics::operation(backend, operation, elapsed);

        let is_read = operation.starts_with("get");
        match result {
            Ok(_) => {
                if is_read {
                    CacheMetrics::hit(backend);
                }
                let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
                debug!(backend, operation, key = %key, elapsed_us, "Cache operation completed");
            }
            Err(CacheError::KeyNotFound { .. }) => {
                CacheMetrics::miss(backend);
            }
            Err(e) => {
                CacheMetrics::error(backend, operation, e.kind());
                warn!(backend, operation, key = %key, error = %e, "Cache operation failed");
            }
        }
    }
}

#[async_trait]
impl<C: Cache> Cache for InstrumentedCache<C> {
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()> {
        let started = Instant::now();
        let result = self.inner.set_single(key, value).await;
        self.observe("set_single", key, started, &result);
        result
    }

    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord> {
        let started = Instant::now();
        let result = self.inner.get_single(key).await;
        self.observe("get_single", key, started, &result);
        result
    }

    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()> {
        let started = Instant::now();
        let result = self.inner.set_multiple(key, values).await;
        self.observe("set_multiple", key, started, &result);
        result
    }

    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord> {
        let started = Instant::now();
        let result = self.inner.get_multiple(key).await;
        self.observe("get_multiple", key, started, &result);
        result
    }

    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
}
