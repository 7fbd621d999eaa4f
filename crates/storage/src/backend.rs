//! Storage backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the contract every
//! document store adapter implements. Services hold it as
//! `Arc<dyn StorageBackend>`, so the trait stays object-safe: values are
//! opaque bytes and typed marshaling lives in [`codec`](crate::codec).
//!
//! # Implementing a Backend
//!
//! 1. Implement the [`StorageBackend`] trait
//! 2. Implement a corresponding [`Transaction`] type
//! 3. Map backend-specific errors to [`StorageError`](crate::StorageError)
//! 4. Run the [`conformance`](crate::conformance) suite against it
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    error::StorageResult,
    key::{EntityKey, KeyQuery},
    transaction::Transaction,
};

/// Abstract document store keyed by [`EntityKey`].
///
/// Backends must be thread-safe (`Send + Sync`) and support concurrent
/// operations. Non-transactional methods are independent, non-isolated
/// operations; use [`transaction`](StorageBackend::transaction) for
/// read-modify-write sequences.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Read one entity |
/// | [`put`](StorageBackend::put) | Unconditional upsert |
/// | [`delete`](StorageBackend::delete) | Remove one entity |
/// | [`count`](StorageBackend::count) | Key-only count query |
/// | [`transaction`](StorageBackend::transaction) | Begin an isolated transaction |
/// | [`health_check`](StorageBackend::health_check) | Verify backend availability |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use docstore_common_storage::{EntityKey, MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
/// let key = EntityKey::new("apps", "app-1").unwrap();
///
/// backend.put(&key, b"{}".to_vec()).await.unwrap();
/// assert_eq!(backend.get(&key).await.unwrap(), Some(Bytes::from("{}")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Reads an entity.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the entity exists
    /// - `Ok(None)` if it doesn't exist
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &EntityKey) -> StorageResult<Option<Bytes>>;

    /// Stores `value` under `key`, overwriting any existing record.
    ///
    /// Returns the key the record was stored under.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn put(&self, key: &EntityKey, value: Vec<u8>) -> StorageResult<EntityKey>;

    /// Deletes an entity.
    ///
    /// Deleting an absent entity is a no-op (returns `Ok(())`).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &EntityKey) -> StorageResult<()>;

    /// Counts the keys matching a key-only query.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn count(&self, query: &KeyQuery) -> StorageResult<usize>;

    /// Begins a new transaction.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>>;

    /// Checks that the backend can serve requests.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}
