//! Backend selection from configuration.

use crate::cache::Cache;
use crate::error::CacheResult;
use crate::layers::{InstrumentedCache, TimeoutCache};
use crate::memcache_cache::MemcacheCache;
use crate::memory_cache::MemoryCache;
use crate::redis_cache::RedisCache;
use courier_config::{CacheBackendKind, CacheConfig};
use std::sync::Arc;
use tracing::info;

/// Build the configured cache backend.
///
/// The result is always instrumented, and wrapped in a [`TimeoutCache`] when
/// `operation_timeout_ms` is non-zero. No network I/O happens here.
pub fn connect(config: &CacheConfig) -> CacheResult<Arc<dyn Cache>> {
    info!(
        backend = %config.backend,
        address = %config.address(),
        "Creating cache"
    );

    match config.backend {
        CacheBackendKind::Redis => Ok(finish(RedisCache::new(&config.host, config.port)?, config)),
        CacheBackendKind::Memcache => Ok(finish(MemcacheCache::new(&config.host, config.port)?, config)),
        CacheBackendKind::Memory => Ok(finish(MemoryCache::new(), config)),
    }
}

fn finish<C: Cache>(backend: C, config: &CacheConfig) -> Arc<dyn Cache> {
    let instrumented = InstrumentedCache::new(backend);
    match config.operation_timeout() {
        Some(timeout) => Arc::new(TimeoutCache::new(instrumented, timeout)),
        None => Arc::new(instrumented),
    }
}
