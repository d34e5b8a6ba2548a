//! # Courier Cache
//!
//! Backend-polymorphic cache for opaque JSON records.
//!
//! Every backend implements [`Cache`]; callers choose one by constructor or
//! through [`connect`] and never see backend-specific types. Decorators in
//! [`layers`] add metrics, deadlines and near/far tiering without touching the
//! adapters.

mod cache;
mod error;
mod factory;
pub mod layers;
mod memcache_cache;
mod memory_cache;
pub mod metrics;
mod record;
mod redis_cache;

pub use cache::{Cache, CacheExt};
pub use error::{CacheError, CacheResult};
pub use factory::connect;
pub use layers::{new_cache, CacheWrapper, InstrumentedCache, TieredCache, TimeoutCache};
pub use memcache_cache::MemcacheCache;
pub use memory_cache::MemoryCache;
pub use metrics::{register_metrics, CacheMetrics};
pub use record::{MultipleDataRecord, SingleDataRecord};
pub use redis_cache::RedisCache;
