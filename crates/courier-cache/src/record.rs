//! Cache record shapes and their byte encoding.
//!
//! Every backend stores records as JSON bytes, so a value written through one
//! adapter instance is recovered exactly by the matching get on that instance.

use crate::error::{CacheError, CacheResult};
use serde_json::Value;

/// A single opaque record.
pub type SingleDataRecord = Value;

/// An ordered sequence of records stored and retrieved as one unit.
pub type MultipleDataRecord = Vec<Value>;

/// Encodes a single record.
pub fn encode_single(key: &str, value: &SingleDataRecord) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| CacheError::Serialization {
        key: key.to_string(),
        source,
    })
}

/// Encodes a sequence of records as one JSON array.
pub fn encode_multiple(key: &str, values: &[SingleDataRecord]) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(values).map_err(|source| CacheError::Serialization {
        key: key.to_string(),
        source,
    })
}

/// Decodes a single record.
pub fn decode_single(key: &str, bytes: &[u8]) -> CacheResult<SingleDataRecord> {
    serde_json::from_slice(bytes).map_err(|source| CacheError::Deserialization {
        key: key.to_string(),
        source,
    })
}

/// Decodes a sequence of records.
///
/// Bytes holding anything other than a JSON array are a shape mismatch.
pub fn decode_multiple(key: &str, bytes: &[u8]) -> CacheResult<MultipleDataRecord> {
    serde_json::from_slice(bytes).map_err(|source| CacheError::Deserialization {
        key: key.to_string(),
        source,
    })
}
