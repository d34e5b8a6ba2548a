//! Cache capability trait and its typed extension.

use crate::error::{CacheError, CacheResult};
use crate::record::{MultipleDataRecord, SingleDataRecord};
use async_trait::async_trait;
use courier_core::Interface;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Cache capability shared by every backend adapter and decorator.
///
/// Records are type-erased as `serde_json::Value` so the trait stays
/// dyn-compatible; use [`CacheExt`] for typed access. Writes never expire,
/// and no operation retries internally. Dropping the returned future cancels
/// the in-flight backend call.
#[async_trait]
pub trait Cache: Interface + Send + Sync {
    /// Store a single record under `key`, replacing any previous value.
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()>;

    /// Fetch a single record.
    ///
    /// Returns [`CacheError::KeyNotFound`] if the key is absent.
    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord>;

    /// Store an ordered sequence of records as one unit under `key`.
    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()>;

    /// Fetch a sequence previously stored with [`Cache::set_multiple`].
    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord>;

    /// Short backend name used in logs and metric labels.
    fn backend_name(&self) -> &str;
}

#[async_trait]
impl<C: Cache + ?Sized> Cache for Arc<C> {
    async fn set_single(&self, key: &str, value: &SingleDataRecord) -> CacheResult<()> {
        (**self).set_single(key, value).await
    }

    async fn get_single(&self, key: &str) -> CacheResult<SingleDataRecord> {
        (**self).get_single(key).await
    }

    async fn set_multiple(&self, key: &str, values: &[SingleDataRecord]) -> CacheResult<()> {
        (**self).set_multiple(key, values).await
    }

    async fn get_multiple(&self, key: &str) -> CacheResult<MultipleDataRecord> {
        (**self).get_multiple(key).await
    }

    fn backend_name(&self) -> &str {
        (**self).backend_name()
    }
}

/// Extension trait with typed methods for convenience.
///
/// Values round-trip through `serde_json::Value`, so any `Serialize` type can
/// be stored and read back as any compatible `DeserializeOwned` type.
#[async_trait]
pub trait CacheExt: Cache {
    /// Store a typed value.
    async fn set_single_as<T: Serialize + Sync>(&self, key: &str, value: &T) -> CacheResult<()> {
        let record = serde_json::to_value(value).map_err(|source| CacheError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.set_single(key, &record).await
    }

    /// Fetch a typed value.
    async fn get_single_as<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<T> {
        let record = self.get_single(key).await?;
        serde_json::from_value(record).map_err(|source| CacheError::Deserialization {
            key: key.to_string(),
            source,
        })
    }

    /// Store a typed sequence.
    async fn set_multiple_as<T: Serialize + Sync>(&self, key: &str, values: &[T]) -> CacheResult<()> {
        let records = values
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| CacheError::Serialization {
                key: key.to_string(),
                source,
            })?;
        self.set_multiple(key, &records).await
    }

    /// Fetch a typed sequence.
    async fn get_multiple_as<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Vec<T>> {
        let records = self.get_multiple(key).await?;
        records
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| CacheError::Deserialization {
                key: key.to_string(),
                source,
            })
    }
}

// Blanket implementation for all Cache implementations
impl<C: Cache + ?Sized> CacheExt for C {}
