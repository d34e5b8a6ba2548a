//! Decorators that add cross-cutting behavior to any [`crate::Cache`].
//!
//! Each decorator owns the capability it wraps and satisfies the same trait,
//! so layers compose freely:
//!
//! ```rust,ignore
//! let cache = TimeoutCache::new(
//!     InstrumentedCache::new(TieredCache::new(MemoryCache::new(), RedisCache::new("127.0.0.1", 6379)?)),
//!     Duration::from_millis(200),
//! );
//! ```

mod instrumented;
mod tiered;
mod timeout;
mod wrapper;

pub use instrumented::InstrumentedCache;
pub use tiered::TieredCache;
pub use timeout::TimeoutCache;
pub use wrapper::{new_cache, CacheWrapper};
