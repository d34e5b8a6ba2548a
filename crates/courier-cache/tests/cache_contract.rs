//! Behavioral tests for the cache contract across adapters and decorators.

use async_trait::async_trait;
use courier_cache::{
    new_cache, Cache, CacheError, CacheExt, CacheResult, InstrumentedCache, MemoryCache, MultipleDataRecord,
    SingleDataRecord, TieredCache, TimeoutCache,
};
use mockall::mock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Backend {}

    #[async_trait]
    impl Cache for Backend {
        async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()>;
        async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord>;
        async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()>;
        async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord>;
        fn backend_name(&self) -> &str;
    }
}

fn unreachable_backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_backend_name().return_const("broken".to_string());
    backend.expect_get_single().returning(|_| Err(CacheError::Connection("refused".into())));
    backend.expect_set_single().returning(|_, _| Err(CacheError::Connection("refused".into())));
    backend
}

/// Memory cache whose writes can be switched to fail.
#[derive(Debug, Default)]
struct FlakyWrites {
    inner: MemoryCache,
    failing: AtomicBool,
}

impl FlakyWrites {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Connection("write refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Cache for FlakyWrites {
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()> {
        self.check()?;
        self.inner.set_single(key, value).await
    }

    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord> {
        self.inner.get_single(key).await
    }

    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()> {
        self.check()?;
        self.inner.set_multiple(key, values).await
    }

    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord> {
        self.inner.get_multiple(key).await
    }

    fn backend_name(&self) -> &str {
        "flaky"
    }
}

/// Every composition callers are expected to build.
fn stacks() -> Vec<Arc<dyn Cache>> {
    vec![
        Arc::new(MemoryCache::new()),
        Arc::new(new_cache(MemoryCache::new())),
        Arc::new(InstrumentedCache::new(MemoryCache::new())),
        Arc::new(TimeoutCache::new(MemoryCache::new(), Duration::from_secs(1))),
        Arc::new(TieredCache::new(MemoryCache::new(), MemoryCache::new())),
    ]
}

#[tokio::test]
async fn test_user_record_round_trip() {
    for cache in stacks() {
        cache.set_single("user:1", &json!({"name": "a"})).await.unwrap();
        let loaded = cache.get_single("user:1").await.unwrap();
        assert_eq!(loaded, json!({"name": "a"}), "backend {}", cache.backend_name());
    }
}

#[tokio::test]
async fn test_sequence_keeps_order_and_length() {
    for cache in stacks() {
        let values = vec![json!({"id": 3}), json!({"id": 1}), json!({"id": 2})];
        cache.set_multiple("orders:recent", &values).await.unwrap();

        let loaded = cache.get_multiple("orders:recent").await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded, values, "backend {}", cache.backend_name());
    }
}

#[tokio::test]
async fn test_never_written_key_is_not_found() {
    for cache in stacks() {
        let err = cache.get_single("user:404").await.unwrap_err();
        assert!(err.is_not_found(), "backend {}: {err}", cache.backend_name());
        assert!(cache.get_multiple("user:404").await.unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn test_last_write_wins() {
    for cache in stacks() {
        cache.set_single("user:1", &json!({"name": "a"})).await.unwrap();
        cache.set_single("user:1", &json!({"name": "b"})).await.unwrap();
        assert_eq!(cache.get_single("user:1").await.unwrap(), json!({"name": "b"}));
    }
}

#[tokio::test]
async fn test_typed_access_through_dyn() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
    }

    let cache: Arc<dyn Cache> = Arc::new(InstrumentedCache::new(MemoryCache::new()));
    cache.set_single_as("user:1", &User { name: "a".into() }).await.unwrap();

    let user: User = cache.get_single_as("user:1").await.unwrap();
    assert_eq!(user, User { name: "a".into() });
}

#[tokio::test]
async fn test_tiered_survives_broken_near_tier() {
    let far = MemoryCache::new();
    far.set_single("user:1", &json!({"name": "a"})).await.unwrap();

    let cache = TieredCache::new(unreachable_backend(), far);
    assert_eq!(cache.get_single("user:1").await.unwrap(), json!({"name": "a"}));
    cache.set_single("user:2", &json!({"name": "b"})).await.unwrap();
    assert_eq!(cache.far().get_single("user:2").await.unwrap(), json!({"name": "b"}));
}

#[tokio::test]
async fn test_tiered_surfaces_far_tier_failure() {
    let cache = TieredCache::new(MemoryCache::new(), unreachable_backend());

    let err = cache.set_single("user:1", &json!(1)).await.unwrap_err();
    assert!(matches!(err, CacheError::Connection(_)));
    // Far write failed, so the near tier must not hold the value.
    assert!(cache.near().is_empty());

    let err = cache.get_single("user:1").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_instrumented_propagates_backend_error() {
    let cache = InstrumentedCache::new(unreachable_backend());
    let err = cache.get_single("user:1").await.unwrap_err();
    assert_eq!(err.kind(), "connection");
    assert_eq!(cache.backend_name(), "broken");
}

#[tokio::test]
async fn test_tiered_overwrite_visible_after_near_write_failure() {
    let near = Arc::new(FlakyWrites::default());
    let cache = TieredCache::new(Arc::clone(&near), MemoryCache::new());

    cache.set_single("user:1", &json!({"name": "a"})).await.unwrap();
    cache.set_multiple("orders", &[json!(1)]).await.unwrap();

    near.set_failing(true);
    cache.set_single("user:1", &json!({"name": "b"})).await.unwrap();
    cache.set_multiple("orders", &[json!(1), json!(2)]).await.unwrap();

    // The near tier still holds the old values; reads must not see them.
    assert_eq!(near.get_single("user:1").await.unwrap(), json!({"name": "a"}));
    assert_eq!(cache.get_single("user:1").await.unwrap(), json!({"name": "b"}));
    assert_eq!(cache.get_multiple("orders").await.unwrap(), vec![json!(1), json!(2)]);

    // Once the near tier accepts writes again, the back-fill repairs it.
    near.set_failing(false);
    assert_eq!(cache.get_single("user:1").await.unwrap(), json!({"name": "b"}));
    assert_eq!(near.get_single("user:1").await.unwrap(), json!({"name": "b"}));
}
