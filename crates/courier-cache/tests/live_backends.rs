//! Contract tests against real Redis and Memcache servers in containers.

mod common;

use common::{TestMemcache, TestRedis};
use courier_cache::{Cache, MemoryCache, RedisCache, TieredCache};
use serde_json::json;
use uuid::Uuid;

fn unique_key(prefix: &str) -> String {
    format!("courier-test:{}:{}", prefix, Uuid::new_v4())
}

async fn exercise(cache: &dyn Cache) {
    let key = unique_key(cache.backend_name());
    cache.set_single(&key, &json!({"name": "a"})).await.unwrap();
    assert_eq!(cache.get_single(&key).await.unwrap(), json!({"name": "a"}));

    cache.set_single(&key, &json!({"name": "b"})).await.unwrap();
    assert_eq!(cache.get_single(&key).await.unwrap(), json!({"name": "b"}));

    let seq_key = unique_key("seq");
    let values = vec![json!(1), json!("two"), json!({"three": 3})];
    cache.set_multiple(&seq_key, &values).await.unwrap();
    assert_eq!(cache.get_multiple(&seq_key).await.unwrap(), values);

    let missing = unique_key("missing");
    assert!(cache.get_single(&missing).await.unwrap_err().is_not_found());
    assert!(cache.get_multiple(&missing).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_redis_contract() {
    let redis = TestRedis::new().await;
    exercise(redis.cache()).await;
    assert_eq!(redis.cache().backend_name(), "redis");
}

#[tokio::test]
async fn test_memcache_contract() {
    let memcache = TestMemcache::new().await;
    exercise(memcache.cache()).await;
    assert_eq!(memcache.cache().backend_name(), "memcache");
}

#[tokio::test]
async fn test_memory_in_front_of_redis() {
    let redis = TestRedis::new().await;
    let far = RedisCache::new("127.0.0.1", redis.port()).unwrap();
    let cache = TieredCache::new(MemoryCache::new(), far);
    exercise(&cache).await;
}
