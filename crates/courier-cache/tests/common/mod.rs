//! Container-backed cache servers for integration tests.

use courier_cache::{Cache, CacheResult, MemcacheCache, RedisCache};
use serde_json::json;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};
use testcontainers_modules::redis::Redis;

const MEMCACHE_PORT: u16 = 11211;
const REDIS_PORT: u16 = 6379;

/// A Redis container and a cache connected to it.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    cache: RedisCache,
    port: u16,
}

impl TestRedis {
    pub async fn new() -> Self {
        let container = Redis::default()
            .start()
            .await
            .expect("Failed to start Redis container");
        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get Redis port");

        let cache = RedisCache::new("127.0.0.1", port).expect("Failed to create Redis cache");
        wait_ready(&cache, 30).await;

        Self {
            _container: container,
            cache,
            port,
        }
    }

    pub fn cache(&self) -> &RedisCache {
        &self.cache
    }

    /// Mapped host port of the server.
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// A Memcache container and a cache connected to it.
pub struct TestMemcache {
    _container: ContainerAsync<GenericImage>,
    cache: MemcacheCache,
}

impl TestMemcache {
    pub async fn new() -> Self {
        let container = GenericImage::new("memcached", "1.6-alpine")
            .with_exposed_port(MEMCACHE_PORT.tcp())
            .with_wait_for(WaitFor::Nothing)
            .start()
            .await
            .expect("Failed to start Memcache container");
        let port = container
            .get_host_port_ipv4(MEMCACHE_PORT)
            .await
            .expect("Failed to get Memcache port");

        let cache = connect_memcache_with_retry(port, 30).await;
        wait_ready(&cache, 30).await;

        Self {
            _container: container,
            cache,
        }
    }

    pub fn cache(&self) -> &MemcacheCache {
        &self.cache
    }
}

async fn connect_memcache_with_retry(port: u16, max_attempts: u32) -> MemcacheCache {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match MemcacheCache::new("127.0.0.1", port) {
            Ok(cache) => return cache,
            Err(e) => {
                if attempts >= max_attempts {
                    panic!("Failed to connect to Memcache after {} attempts: {}", max_attempts, e);
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Retries a write until the server accepts it.
async fn wait_ready(cache: &dyn Cache, max_attempts: u32) {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let result: CacheResult<()> = cache.set_single("courier-test:ready", &json!(true)).await;
        match result {
            Ok(()) => return,
            Err(e) => {
                if attempts >= max_attempts {
                    panic!(
                        "{} not ready after {} attempts: {}",
                        cache.backend_name(),
                        max_attempts,
                        e
                    );
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
