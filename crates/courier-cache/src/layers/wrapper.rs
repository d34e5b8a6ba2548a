//! Plain forwarding decorator.

use crate::cache::Cache;
use crate::error::CacheResult;
use crate::record::{MultipleDataRecord, SingleDataRecord};
use async_trait::async_trait;

/// Owns a cache and forwards every call to it unchanged.
///
/// The base for ad-hoc decoration: callers hold a `CacheWrapper<C>` where
/// they would hold `C`, and behavior can be layered in later without
/// touching the adapters.
#[derive(Debug)]
pub struct CacheWrapper<C> {
    inner: C,
}

impl<C: Cache> CacheWrapper<C> {
    /// Wrap `inner`.
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped cache.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap into the wrapped cache.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

/// Wrap any cache implementation in a [`CacheWrapper`].
pub fn new_cache<C: Cache>(cache: C) -> CacheWrapper<C> {
    CacheWrapper::new(cache)
}

#[async_trait]
impl<C: Cache> Cache for CacheWrapper<C> {
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()> {
        self.inner.set_single(key, value).await
    }

    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord> {
        self.inner.get_single(key).await
    }

    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()> {
        self.inner.set_multiple(key, values).await
    }

    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord> {
        self.inner.get_multiple(key).await
    }

    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;
    use serde_json::json;

    #[tokio::test]
    async fn test_wrapper_forwards() {
        let cache = new_cache(MemoryCache::new());
        cache.set_single("user:1", &json!({"name": "a"})).await.unwrap();

        assert_eq!(cache.get_single("user:1").await.unwrap(), json!({"name": "a"}));
        assert_eq!(cache.inner().len(), 1);
        assert_eq!(cache.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_wrapper_nests() {
        let cache = new_cache(new_cache(MemoryCache::new()));
        cache.set_multiple("seq", &[json!(1), json!(2)]).await.unwrap();
        assert_eq!(cache.get_multiple("seq").await.unwrap(), vec![json!(1), json!(2)]);
        assert!(cache.get_single("absent").await.unwrap_err().is_not_found());
    }
}
