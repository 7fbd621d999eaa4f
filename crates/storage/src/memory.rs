//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-memory implementation of
//! [`StorageBackend`] suitable for testing, local development and emulator
//! connections.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for the record map
//! - **Ordered storage**: Keys are stored in a [`BTreeMap`], so a collection is one contiguous
//!   range
//! - **Pessimistic transactions**: Per-entity locks held from first access until commit or
//!   rollback, so concurrent read-modify-write sequences serialize instead of losing updates
//!
//! # Example
//!
//! ```
//! use docstore_common_storage::{EntityKey, MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!     let key = EntityKey::new("greetings", "en").unwrap();
//!
//!     backend.put(&key, b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(&key).await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Lock waits are bounded by [`lock_timeout`](MemoryBackend::lock_timeout); a transaction that
//!   cannot claim an entity in time fails with [`StorageError::Conflict`]

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use fail::fail_point;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, instrument};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    key::{EntityKey, KeyQuery, collection_prefix},
    transaction::Transaction,
};

/// Default time a transaction waits to claim an entity.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Lock table size above which idle entries are pruned.
const LOCK_TABLE_PRUNE_THRESHOLD: usize = 1024;

type LockGuard = OwnedMutexGuard<()>;

/// Per-entity async locks, created on demand.
#[derive(Default)]
struct KeyLocks {
    table: Mutex<HashMap<Vec<u8>, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    fn handle(&self, key: &[u8]) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock();
        if let Some(lock) = table.get(key) {
            return Arc::clone(lock);
        }

        // Entries only referenced by the table are neither held nor awaited.
        if table.len() >= LOCK_TABLE_PRUNE_THRESHOLD {
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        let lock = Arc::new(AsyncMutex::new(()));
        table.insert(key.to_vec(), Arc::clone(&lock));
        lock
    }

    async fn acquire(&self, key: &[u8], timeout: Duration) -> StorageResult<LockGuard> {
        let lock = self.handle(key);
        tokio::time::timeout(timeout, lock.lock_owned()).await.map_err(|_| {
            debug!(timeout_ms = timeout.as_millis() as u64, "entity lock wait timed out");
            StorageError::Conflict
        })
    }
}

/// In-memory document store using [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same records and the same lock table.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
    locks: Arc<KeyLocks>,
    lock_timeout: Duration,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entities", &self.data.read().len())
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Creates an empty backend with [`DEFAULT_LOCK_TIMEOUT`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates an empty backend whose transactions wait at most
    /// `lock_timeout` to claim an entity.
    #[must_use]
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            locks: Arc::new(KeyLocks::default()),
            lock_timeout,
        }
    }

    /// Returns the configured lock wait bound.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Returns the number of stored entities across all collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no entity is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn get(&self, key: &EntityKey) -> StorageResult<Option<Bytes>> {
        let data = self.data.read();
        Ok(data.get(&key.encode()).cloned())
    }

    #[instrument(skip(self, key, value), fields(key = %key, value_len = value.len()))]
    async fn put(&self, key: &EntityKey, value: Vec<u8>) -> StorageResult<EntityKey> {
        fail_point!("memory-put", |_| {
            Err(StorageError::connection("injected failure in memory put"))
        });

        // Single-entity writes wait for any transaction that claimed the entity.
        let encoded = key.encode();
        let _guard = self.locks.acquire(&encoded, self.lock_timeout).await?;
        self.data.write().insert(encoded, Bytes::from(value));
        Ok(key.clone())
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn delete(&self, key: &EntityKey) -> StorageResult<()> {
        fail_point!("memory-delete", |_| {
            Err(StorageError::connection("injected failure in memory delete"))
        });

        let encoded = key.encode();
        let _guard = self.locks.acquire(&encoded, self.lock_timeout).await?;
        self.data.write().remove(&encoded);
        Ok(())
    }

    #[instrument(skip(self, query), fields(collection = query.collection()))]
    async fn count(&self, query: &KeyQuery) -> StorageResult<usize> {
        fail_point!("memory-count", |_| {
            Err(StorageError::connection("injected failure in memory count"))
        });

        if let Some(key) = query.key_filter() {
            if !query.matches(key) {
                return Ok(0);
            }
            return Ok(usize::from(self.data.read().contains_key(&key.encode())));
        }

        let prefix = collection_prefix(query.collection());
        let data = self.data.read();
        Ok(data.range(prefix.clone()..).take_while(|(k, _)| k.starts_with(&prefix)).count())
    }

    #[instrument(skip(self))]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        fail_point!("memory-begin-transaction", |_| {
            Err(StorageError::connection("injected failure opening transaction"))
        });

        Ok(Box::new(MemoryTransaction::new(self.clone())))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<()> {
        fail_point!("memory-health-check", |_| {
            Err(StorageError::connection("injected health check failure"))
        });

        // Try to acquire read lock to verify we're not deadlocked
        let _unused = self.data.read();
        Ok(())
    }
}

/// In-memory transaction implementation.
///
/// Holds the lock of every entity it has read or written. Writes are
/// buffered until commit, providing read-your-writes semantics.
struct MemoryTransaction {
    backend: MemoryBackend,
    claimed: HashMap<Vec<u8>, LockGuard>,
    pending_writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl MemoryTransaction {
    fn new(backend: MemoryBackend) -> Self {
        Self { backend, claimed: HashMap::new(), pending_writes: BTreeMap::new() }
    }

    async fn claim(&mut self, key: &[u8]) -> StorageResult<()> {
        if self.claimed.contains_key(key) {
            return Ok(());
        }
        let guard = self.backend.locks.acquire(key, self.backend.lock_timeout).await?;
        self.claimed.insert(key.to_vec(), guard);
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, key: &EntityKey) -> StorageResult<Option<Bytes>> {
        let encoded = key.encode();

        // Check pending writes first (read-your-writes)
        if let Some(value) = self.pending_writes.get(&encoded) {
            return Ok(value.as_ref().map(|v| Bytes::copy_from_slice(v)));
        }

        self.claim(&encoded).await?;
        Ok(self.backend.data.read().get(&encoded).cloned())
    }

    fn put(&mut self, key: EntityKey, value: Vec<u8>) {
        self.pending_writes.insert(key.encode(), Some(value));
    }

    fn delete(&mut self, key: EntityKey) {
        self.pending_writes.insert(key.encode(), None);
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        fail_point!("memory-commit", |_| {
            Err(StorageError::connection("injected failure committing transaction"))
        });

        let mut this = *self;

        // Claim write-only entities in key order before touching the map.
        let unclaimed: Vec<Vec<u8>> = this
            .pending_writes
            .keys()
            .filter(|k| !this.claimed.contains_key(*k))
            .cloned()
            .collect();
        for key in unclaimed {
            this.claim(&key).await?;
        }

        let mut data = this.backend.data.write();
        for (key, value) in std::mem::take(&mut this.pending_writes) {
            match value {
                Some(v) => {
                    data.insert(key, Bytes::from(v));
                },
                None => {
                    data.remove(&key);
                },
            }
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        // Dropping the guards releases every claimed entity.
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn key(name: &str) -> EntityKey {
        EntityKey::new("things", name).unwrap()
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let backend = MemoryBackend::new();

        let stored = backend.put(&key("k1"), b"value1".to_vec()).await.unwrap();
        assert_eq!(stored, key("k1"));
        assert_eq!(backend.get(&key("k1")).await.unwrap(), Some(Bytes::from("value1")));

        backend.delete(&key("k1")).await.unwrap();
        assert_eq!(backend.get(&key("k1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_count_is_scoped_to_collection() {
        let backend = MemoryBackend::new();
        backend.put(&key("a"), b"1".to_vec()).await.unwrap();
        backend.put(&key("b"), b"2".to_vec()).await.unwrap();
        backend.put(&EntityKey::new("thing", "a").unwrap(), b"3".to_vec()).await.unwrap();
        backend.put(&EntityKey::new("thingsx", "a").unwrap(), b"4".to_vec()).await.unwrap();

        let all = KeyQuery::new("things").unwrap();
        assert_eq!(backend.count(&all).await.unwrap(), 2);

        let one = KeyQuery::for_key(&key("a"));
        assert_eq!(backend.count(&one).await.unwrap(), 1);

        let missing = KeyQuery::for_key(&key("zzz"));
        assert_eq!(backend.count(&missing).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transaction_read_your_writes() {
        let backend = MemoryBackend::new();
        backend.put(&key("k1"), b"value1".to_vec()).await.unwrap();

        let mut txn = backend.transaction().await.unwrap();
        assert_eq!(txn.get(&key("k1")).await.unwrap(), Some(Bytes::from("value1")));

        txn.put(key("k2"), b"value2".to_vec());
        assert_eq!(txn.get(&key("k2")).await.unwrap(), Some(Bytes::from("value2")));

        txn.delete(key("k1"));
        assert_eq!(txn.get(&key("k1")).await.unwrap(), None);

        // Nothing visible outside before commit.
        assert_eq!(backend.get(&key("k2")).await.unwrap(), None);

        txn.commit().await.unwrap();

        assert_eq!(backend.get(&key("k1")).await.unwrap(), None);
        assert_eq!(backend.get(&key("k2")).await.unwrap(), Some(Bytes::from("value2")));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let backend = MemoryBackend::new();

        let mut txn = backend.transaction().await.unwrap();
        txn.put(key("k"), b"v".to_vec());
        txn.rollback().await.unwrap();

        assert_eq!(backend.get(&key("k")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_claimed_entity_blocks_second_transaction() {
        let backend = MemoryBackend::with_lock_timeout(Duration::from_millis(50));

        let mut first = backend.transaction().await.unwrap();
        first.get(&key("hot")).await.unwrap();

        let mut second = backend.transaction().await.unwrap();
        let result = second.get(&key("hot")).await;
        assert!(matches!(result, Err(StorageError::Conflict)), "got {result:?}");

        // Other entities are unaffected.
        assert!(second.get(&key("cold")).await.is_ok());
        first.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_releases_claims() {
        let backend = MemoryBackend::with_lock_timeout(Duration::from_millis(50));

        let mut first = backend.transaction().await.unwrap();
        first.get(&key("hot")).await.unwrap();
        drop(first);

        let mut second = backend.transaction().await.unwrap();
        assert!(second.get(&key("hot")).await.is_ok());
    }

    #[tokio::test]
    async fn test_put_waits_for_claiming_transaction() {
        let backend = MemoryBackend::with_lock_timeout(Duration::from_millis(50));

        let mut txn = backend.transaction().await.unwrap();
        txn.get(&key("hot")).await.unwrap();

        let result = backend.put(&key("hot"), b"x".to_vec()).await;
        assert!(matches!(result, Err(StorageError::Conflict)), "got {result:?}");

        txn.rollback().await.unwrap();
        backend.put(&key("hot"), b"x".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_table_prunes_idle_entries() {
        let backend = MemoryBackend::new();
        for i in 0..(LOCK_TABLE_PRUNE_THRESHOLD + 10) {
            backend.put(&key(&format!("k{i}")), b"v".to_vec()).await.unwrap();
        }
        assert!(backend.locks.table.lock().len() <= LOCK_TABLE_PRUNE_THRESHOLD);
    }

    #[tokio::test]
    async fn test_clone_shares_data() {
        let backend1 = MemoryBackend::new();
        let backend2 = backend1.clone();

        backend1.put(&key("k"), b"value".to_vec()).await.unwrap();
        assert_eq!(backend2.get(&key("k")).await.unwrap(), Some(Bytes::from("value")));
        assert_eq!(backend2.len(), 1);
        assert!(!backend2.is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        let backend = MemoryBackend::default();
        assert!(backend.health_check().await.is_ok());
        assert_eq!(backend.lock_timeout(), DEFAULT_LOCK_TIMEOUT);
    }
}
