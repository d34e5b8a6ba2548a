//! Two-tier near/far cache.

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::record::{MultipleDataRecord, SingleDataRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Near/far cache pair, typically an in-process [`crate::MemoryCache`] in
/// front of a network backend.
///
/// Reads try the near tier first and fall back to the far tier, back-filling
/// the near tier on a far hit. Writes go to the far tier first, then the near
/// tier. `KeyNotFound` is returned only when both tiers miss. Near-tier
/// failures are logged and never surface to the caller; far-tier failures
/// always do.
///
/// A key whose near write failed is marked stale and read from the far tier
/// until a later near write for it succeeds.
#[derive(Debug)]
pub struct TieredCache<N, F> {
    near: N,
    far: F,
    name: String,
    stale: Mutex<HashSet<String>>,
}

impl<N: Cache, F: Cache> TieredCache<N, F> {
    /// Pair a near and a far cache.
    pub fn new(near: N, far: F) -> Self {
        let name = format!("{}+{}", near.backend_name(), far.backend_name());
        Self {
            near,
            far,
            name,
            stale: Mutex::new(HashSet::new()),
        }
    }

    /// The near tier.
    pub fn near(&self) -> &N {
        &self.near
    }

    /// The far tier.
    pub fn far(&self) -> &F {
        &self.far
    }

    fn near_failed(&self, operation: &'static str, key: &str, error: &CacheError) {
        if !error.is_not_found() {
            warn!(
                near = %self.near.backend_name(),
                operation,
                key = %key,
                error = %error,
                "Near tier failed, falling through"
            );
        }
    }

    fn is_stale(&self, key: &str) -> bool {
        self.stale.lock().contains(key)
    }

    /// Record the outcome of a near-tier write for `key`.
    fn near_written(&self, operation: &'static str, key: &str, result: CacheResult<()>) {
        match result {
            Ok(()) => {
                self.stale.lock().remove(key);
            }
            Err(e) => {
                self.stale.lock().insert(key.to_string());
                self.near_failed(operation, key, &e);
            }
        }
    }

    fn fallback(&self, key: &str) {
        debug!(key = %key, near = %self.near.backend_name(), far = %self.far.backend_name(), "Served from far tier");
        CacheMetrics::tier_fallback(self.near.backend_name(), self.far.backend_name());
    }
}

#[async_trait]
impl<N: Cache, F: Cache> Cache for TieredCache<N, F> {
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()> {
        self.far.set_single(key, value).await?;
        let result = self.near.set_single(key, value).await;
        self.near_written("set_single", key, result);
        Ok(())
    }

    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord> {
        if !self.is_stale(key) {
            match self.near.get_single(key).await {
                Ok(value) => return Ok(value),
                Err(e) => self.near_failed("get_single", key, &e),
            }
        }

        let value = self.far.get_single(key).await?;
        self.fallback(key);
        let result = self.near.set_single(key, &value).await;
        self.near_written("set_single", key, result);
        Ok(value)
    }

    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()> {
        self.far.set_multiple(key, values).await?;
        let result = self.near.set_multiple(key, values).await;
        self.near_written("set_multiple", key, result);
        Ok(())
    }

    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord> {
        if !self.is_stale(key) {
            match self.near.get_multiple(key).await {
                Ok(values) => return Ok(values),
                Err(e) => self.near_failed("get_multiple", key, &e),
            }
        }

        let values = self.far.get_multiple(key).await?;
        self.fallback(key);
        let result = self.near.set_multiple(key, &values).await;
        self.near_written("set_multiple", key, result);
        Ok(values)
    }

    fn backend_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;
    use serde_json::json;

    fn tiered() -> TieredCache<MemoryCache, MemoryCache> {
        TieredCache::new(MemoryCache::new(), MemoryCache::new())
    }

    #[tokio::test]
    async fn test_write_through_both_tiers() {
        let cache = tiered();
        cache.set_single("user:1", &json!({"id": 1})).await.unwrap();

        assert_eq!(cache.near().len(), 1);
        assert_eq!(cache.far().len(), 1);
        assert_eq!(cache.backend_name(), "memory+memory");
    }

    #[tokio::test]
    async fn test_far_hit_backfills_near() {
        let cache = tiered();
        cache.far().set_multiple("seq", &[json!(1), json!(2)]).await.unwrap();
        assert!(cache.near().is_empty());

        let values = cache.get_multiple("seq").await.unwrap();
        assert_eq!(values, vec![json!(1), json!(2)]);
        assert_eq!(cache.near().get_multiple("seq").await.unwrap(), values);
    }

    #[tokio::test]
    async fn test_near_hit_skips_far() {
        let cache = tiered();
        cache.near().set_single("k", &json!("near")).await.unwrap();
        cache.far().set_single("k", &json!("far")).await.unwrap();

        assert_eq!(cache.get_single("k").await.unwrap(), json!("near"));
    }

    #[tokio::test]
    async fn test_miss_on_both_tiers() {
        let cache = tiered();
        assert!(cache.get_single("absent").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_corrupt_near_entry_falls_through() {
        let cache = tiered();
        cache.near().insert_raw("k", b"garbage".to_vec());
        cache.far().set_single("k", &json!(7)).await.unwrap();

        assert_eq!(cache.get_single("k").await.unwrap(), json!(7));
        // Back-fill replaced the corrupt entry.
        assert_eq!(cache.near().get_single("k").await.unwrap(), json!(7));
    }
}
