//! Metrics for cache monitoring.
//!
//! Recorded through the `metrics` facade; install any exporter to collect them.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Metric names for the cache layer.
pub mod names {
    /// Total cache operations.
    pub const CACHE_OPERATIONS_TOTAL: &str = "courier_cache_operations_total";
    /// Total cache hits.
    pub const CACHE_HITS_TOTAL: &str = "courier_cache_hits_total";
    /// Total cache misses.
    pub const CACHE_MISSES_TOTAL: &str = "courier_cache_misses_total";
    /// Total failed cache operations (misses excluded).
    pub const CACHE_ERRORS_TOTAL: &str = "courier_cache_errors_total";
    /// Total backend connections opened.
    pub const CACHE_CONNECTIONS_TOTAL: &str = "courier_cache_connections_total";
    /// Total far-tier fallbacks in a tiered cache.
    pub const CACHE_TIER_FALLBACKS_TOTAL: &str = "courier_cache_tier_fallbacks_total";
    /// Operation duration in seconds.
    pub const CACHE_OPERATION_DURATION: &str = "courier_cache_operation_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CACHE_OPERATIONS_TOTAL, "Total number of cache operations");
    describe_counter!(names::CACHE_HITS_TOTAL, "Total number of cache hits");
    describe_counter!(names::CACHE_MISSES_TOTAL, "Total number of cache misses");
    describe_counter!(names::CACHE_ERRORS_TOTAL, "Total number of failed cache operations");
    describe_counter!(names::CACHE_CONNECTIONS_TOTAL, "Total number of backend connections opened");
    describe_counter!(
        names::CACHE_TIER_FALLBACKS_TOTAL,
        "Total number of reads served by the far tier of a tiered cache"
    );
    describe_histogram!(names::CACHE_OPERATION_DURATION, "Cache operation duration in seconds");
}

/// Cache metrics recorder.
#[derive(Clone)]
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a completed operation and its duration.
    pub fn operation(backend: &str, operation: &'static str, duration: Duration) {
        counter!(
            names::CACHE_OPERATIONS_TOTAL,
            "backend" => backend.to_string(),
            "operation" => operation
        )
        .increment(1);

        histogram!(
            names::CACHE_OPERATION_DURATION,
            "backend" => backend.to_string(),
            "operation" => operation
        )
        .record(duration.as_secs_f64());
    }

    /// Record a cache hit.
    pub fn hit(backend: &str) {
        counter!(names::CACHE_HITS_TOTAL, "backend" => backend.to_string()).increment(1);
    }

    /// Record a cache miss.
    pub fn miss(backend: &str) {
        counter!(names::CACHE_MISSES_TOTAL, "backend" => backend.to_string()).increment(1);
    }

    /// Record a failed operation.
    pub fn error(backend: &str, operation: &'static str, error_type: &'static str) {
        counter!(
            names::CACHE_ERRORS_TOTAL,
            "backend" => backend.to_string(),
            "operation" => operation,
            "error_type" => error_type
        )
        .increment(1);
    }

    /// Record a backend connection being opened.
    pub fn connection_opened(backend: &'static str) {
        counter!(names::CACHE_CONNECTIONS_TOTAL, "backend" => backend).increment(1);
    }

    /// Record a read that missed the near tier and was served by the far tier.
    pub fn tier_fallback(near: &str, far: &str) {
        counter!(
            names::CACHE_TIER_FALLBACKS_TOTAL,
            "near" => near.to_string(),
            "far" => far.to_string()
        )
        .increment(1);
    }
}
