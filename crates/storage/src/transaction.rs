//! Transaction trait for isolated read-modify-write sequences.
//!
//! This module defines the [`Transaction`] trait returned by
//! [`StorageBackend::transaction`](crate::StorageBackend::transaction).
//!
//! # Transaction Semantics
//!
//! Transactions provide:
//! - **Isolation**: Entities read or written in a transaction cannot be changed by another
//!   transaction until this one commits or rolls back
//! - **Atomicity**: Buffered writes are applied together at commit, or not at all
//! - **Read-your-writes**: Reads within a transaction see pending writes
//!
//! # Example
//!
//! ```
//! use docstore_common_storage::{EntityKey, MemoryBackend, StorageBackend};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//! let key = EntityKey::new("counters", "visits").unwrap();
//!
//! let mut txn = backend.transaction().await.unwrap();
//! let current = txn.get(&key).await.unwrap();
//! assert!(current.is_none());
//! txn.put(key.clone(), b"1".to_vec());
//! txn.commit().await.unwrap();
//!
//! assert_eq!(&backend.get(&key).await.unwrap().unwrap()[..], b"1");
//! # });
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, key::EntityKey};

/// Transaction handle for one isolated read-modify-write sequence.
///
/// A transaction buffers writes and deletes until [`commit`](Transaction::commit)
/// is called, at which point they are applied atomically.
///
/// # Concurrency
///
/// Reading an entity inside a transaction claims it: a second transaction
/// touching the same entity waits until the first finishes. A backend that
/// cannot obtain the claim in time aborts with
/// [`StorageError::Conflict`](crate::StorageError::Conflict). Nothing at this
/// layer retries.
///
/// Dropping a transaction without committing discards its writes and releases
/// its claims, exactly like [`rollback`](Transaction::rollback).
#[async_trait]
pub trait Transaction: Send {
    /// Reads an entity within the transaction.
    ///
    /// Pending writes of this transaction are returned first; otherwise the
    /// committed record is read and the entity is claimed for the rest of
    /// the transaction.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the entity exists
    /// - `Ok(None)` if it does not exist or was deleted in this transaction
    /// - `Err(...)` on storage errors, including lock timeouts
    async fn get(&mut self, key: &EntityKey) -> StorageResult<Option<Bytes>>;

    /// Buffers a write of `value` under `key`.
    ///
    /// The write becomes visible to other readers only after commit.
    fn put(&mut self, key: EntityKey, value: Vec<u8>);

    /// Buffers a delete of `key`.
    fn delete(&mut self, key: EntityKey);

    /// Commits all buffered operations atomically.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if a written entity could not
    ///   be claimed
    /// - Other [`StorageError`](crate::StorageError) variants on backend failures
    ///
    /// The transaction is consumed whether or not commit succeeds.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards all buffered operations and releases claimed entities.
    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
