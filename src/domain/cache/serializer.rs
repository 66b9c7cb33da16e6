//! Payload serialization

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::domain::CacheError;

/// Encodes query results to bytes and decodes them back
///
/// Implementations must satisfy the round-trip law: decoding the bytes
/// produced by `serialize(v)` leaves the destination logically equal to `v`.
pub trait Serializer: Send + Sync + Debug {
    /// Encodes a value
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, CacheError>
    where
        T: Serialize + ?Sized;

    /// Decodes a payload into the destination
    fn deserialize<T>(&self, payload: &[u8], dest: &mut T) -> Result<(), CacheError>
    where
        T: DeserializeOwned;
}

/// JSON serializer, the default codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, CacheError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value).map_err(|e| {
            CacheError::serialization(format!("Failed to serialize cache value: {}", e))
        })
    }

    fn deserialize<T>(&self, payload: &[u8], dest: &mut T) -> Result<(), CacheError>
    where
        T: DeserializeOwned,
    {
        *dest = serde_json::from_slice(payload).map_err(|e| {
            CacheError::serialization(format!("Failed to deserialize cache value: {}", e))
        })?;

        Ok(())
    }
}
