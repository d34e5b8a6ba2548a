//! In-process cache backend.

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::record::{self, MultipleDataRecord, SingleDataRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Map-backed cache living in the current process.
///
/// Records go through the same JSON encoding as the network backends, so
/// tests against it exercise the full serialization path. Used as the near
/// tier of a [`crate::TieredCache`] and for local development.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove a key. Returns true if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Store raw bytes, bypassing encoding.
    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        self.entries.write().insert(key.to_string(), bytes);
    }

    fn get_bytes(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::not_found(key))
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()> {
        let bytes = record::encode_single(key, value)?;
        self.insert_raw(key, bytes);
        Ok(())
    }

    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord> {
        let bytes = self.get_bytes(key)?;
        record::decode_single(key, &bytes)
    }

    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()> {
        let bytes = record::encode_multiple(key, values)?;
        self.insert_raw(key, bytes);
        Ok(())
    }

    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord> {
        let bytes = self.get_bytes(key)?;
        record::decode_multiple(key, &bytes)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
