//! JSON marshaling between caller entities and stored bytes.
//!
//! Backends only see opaque bytes. Services use these helpers to turn a
//! `Serialize` entity into a record and back, mapping failures onto
//! [`StorageError::Serialization`].

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{StorageError, StorageResult};

/// Encodes an entity as a JSON record.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the entity cannot be serialized
/// (for example a map with non-string keys).
pub fn encode_entity<T>(entity: &T) -> StorageResult<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    serde_json::to_vec(entity)
        .map_err(|e| StorageError::serialization_with_source("failed to encode entity", e))
}

/// Decodes a JSON record into an entity.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the record is not valid JSON or
/// does not match the shape of `T`.
pub fn decode_entity<T>(bytes: &[u8]) -> StorageResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::serialization_with_source("failed to decode entity", e))
}
