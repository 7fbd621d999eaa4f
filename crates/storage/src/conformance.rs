//! Conformance test suite for [`StorageBackend`] implementations.
//!
//! Every store adapter, whether in-memory or a managed-store client, can run
//! the same suite to show it honours the contract the counter and entity
//! services depend on.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each conformance function with a
//! fresh backend instance:
//!
//! ```no_run
//! use docstore_common_storage::{MemoryBackend, conformance};
//!
//! #[tokio::test]
//! async fn crud_get_returns_none_for_missing_key() {
//!     conformance::crud_get_returns_none_for_missing_key(&MemoryBackend::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Functions | Contract aspect |
//! |----------|-----------|-----------------|
//! | CRUD | 5 tests | get/put/delete semantics |
//! | Count | 2 tests | key-only count queries |
//! | Transaction | 5 tests | commit, rollback, read-your-writes, isolation |

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;

use crate::{
    backend::StorageBackend,
    key::{EntityKey, KeyQuery},
    testutil::make_key,
};

const COLLECTION: &str = "conformance";

fn key(name: &str) -> EntityKey {
    EntityKey::new(COLLECTION, name).expect("conformance key must be valid")
}

// ============================================================================
// CRUD
// ============================================================================

/// `get` on a nonexistent entity returns `Ok(None)`.
pub async fn crud_get_returns_none_for_missing_key<B: StorageBackend>(backend: &B) {
    let result = backend.get(&key("nonexistent")).await;
    assert!(result.is_ok(), "get should not error on missing entity: {result:?}");
    assert_eq!(result.expect("checked above"), None, "missing entity should return None");
}

/// `put` then `get` returns the stored bytes, and `put` echoes the key.
pub async fn crud_put_then_get_returns_value<B: StorageBackend>(backend: &B) {
    let stored = backend.put(&key("k1"), b"v1".to_vec()).await.expect("put should succeed");
    assert_eq!(stored, key("k1"), "put should return the key it stored under");
    let val = backend.get(&key("k1")).await.expect("get should succeed");
    assert_eq!(val, Some(Bytes::from("v1")));
}

/// `put` on an existing entity overwrites it.
pub async fn crud_put_overwrites_existing<B: StorageBackend>(backend: &B) {
    backend.put(&key("k1"), b"original".to_vec()).await.expect("put");
    backend.put(&key("k1"), b"updated".to_vec()).await.expect("overwrite");
    let val = backend.get(&key("k1")).await.expect("get");
    assert_eq!(val, Some(Bytes::from("updated")));
}

/// `delete` on a nonexistent entity is a silent no-op.
pub async fn crud_delete_nonexistent_is_noop<B: StorageBackend>(backend: &B) {
    let result = backend.delete(&key("ghost")).await;
    assert!(result.is_ok(), "delete of nonexistent entity should not error: {result:?}");
}

/// `delete` removes a previously stored entity.
pub async fn crud_delete_removes_key<B: StorageBackend>(backend: &B) {
    backend.put(&key("k2"), b"val".to_vec()).await.expect("put");
    backend.delete(&key("k2")).await.expect("delete");
    let val = backend.get(&key("k2")).await.expect("get after delete");
    assert_eq!(val, None, "entity should be gone after delete");
}

// ============================================================================
// Count
// ============================================================================

/// A collection query counts only that collection's entities.
pub async fn count_is_scoped_to_collection<B: StorageBackend>(backend: &B) {
    for i in 0..3 {
        backend.put(&make_key(COLLECTION, i), b"{}".to_vec()).await.expect("put");
    }
    let other = EntityKey::new("conformance-other", "x").expect("valid key");
    backend.put(&other, b"{}".to_vec()).await.expect("put other");

    let query = KeyQuery::new(COLLECTION).expect("valid query");
    assert_eq!(backend.count(&query).await.expect("count"), 3);
}

/// A key-filtered query counts one when the entity exists and zero otherwise.
pub async fn count_with_key_filter<B: StorageBackend>(backend: &B) {
    backend.put(&key("present"), b"{}".to_vec()).await.expect("put");

    let present = KeyQuery::for_key(&key("present"));
    assert_eq!(backend.count(&present).await.expect("count"), 1);

    let absent = KeyQuery::for_key(&key("absent"));
    assert_eq!(backend.count(&absent).await.expect("count"), 0);
}

// ============================================================================
// Transaction
// ============================================================================

/// Committed transaction writes become visible.
pub async fn txn_commit_applies_writes<B: StorageBackend>(backend: &B) {
    let mut txn = backend.transaction().await.expect("begin");
    txn.put(key("t1"), b"a".to_vec());
    txn.put(key("t2"), b"b".to_vec());
    txn.commit().await.expect("commit");

    assert_eq!(backend.get(&key("t1")).await.expect("get"), Some(Bytes::from("a")));
    assert_eq!(backend.get(&key("t2")).await.expect("get"), Some(Bytes::from("b")));
}

/// Rolled back transaction writes are discarded.
pub async fn txn_rollback_discards_writes<B: StorageBackend>(backend: &B) {
    let mut txn = backend.transaction().await.expect("begin");
    txn.put(key("rb"), b"a".to_vec());
    txn.rollback().await.expect("rollback");

    assert_eq!(backend.get(&key("rb")).await.expect("get"), None);
}

/// Reads inside a transaction observe its own pending writes and deletes.
pub async fn txn_read_your_writes<B: StorageBackend>(backend: &B) {
    backend.put(&key("ryw"), b"old".to_vec()).await.expect("seed");

    let mut txn = backend.transaction().await.expect("begin");
    txn.put(key("ryw"), b"new".to_vec());
    assert_eq!(txn.get(&key("ryw")).await.expect("get"), Some(Bytes::from("new")));
    txn.delete(key("ryw"));
    assert_eq!(txn.get(&key("ryw")).await.expect("get"), None);
    txn.rollback().await.expect("rollback");

    assert_eq!(backend.get(&key("ryw")).await.expect("get"), Some(Bytes::from("old")));
}

/// Uncommitted writes are invisible to non-transactional reads.
pub async fn txn_writes_invisible_before_commit<B: StorageBackend>(backend: &B) {
    let mut txn = backend.transaction().await.expect("begin");
    txn.put(key("hidden"), b"v".to_vec());
    assert_eq!(backend.get(&key("hidden")).await.expect("get"), None);
    txn.commit().await.expect("commit");
    assert_eq!(backend.get(&key("hidden")).await.expect("get"), Some(Bytes::from("v")));
}

/// Concurrent transactional read-modify-write sequences on one entity never
/// lose an update: committed increments sum exactly.
pub async fn txn_concurrent_read_modify_write_is_isolated<B>(backend: Arc<B>)
where
    B: StorageBackend + 'static,
{
    const TASKS: usize = 8;
    const ROUNDS: usize = 10;

    let mut set = JoinSet::new();
    for _ in 0..TASKS {
        let backend = Arc::clone(&backend);
        set.spawn(async move {
            let mut committed = 0usize;
            for _ in 0..ROUNDS {
                let mut txn = backend.transaction().await.expect("begin");
                let Ok(current) = txn.get(&key("shared")).await else { continue };
                let n: usize = current
                    .map(|b| String::from_utf8_lossy(&b).parse().expect("numeric"))
                    .unwrap_or(0);
                txn.put(key("shared"), (n + 1).to_string().into_bytes());
                if txn.commit().await.is_ok() {
                    committed += 1;
                }
            }
            committed
        });
    }

    let mut committed = 0usize;
    while let Some(result) = set.join_next().await {
        committed += result.expect("task should not panic");
    }

    let stored = backend
        .get(&key("shared"))
        .await
        .expect("get")
        .map(|b| String::from_utf8_lossy(&b).parse::<usize>().expect("numeric"))
        .unwrap_or(0);
    assert_eq!(stored, committed, "every committed increment must be reflected");
}
