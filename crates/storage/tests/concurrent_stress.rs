//! Concurrent access stress tests for `MemoryBackend`.
//!
//! These tests exercise the backend under multi-threaded workloads to detect
//! data races, deadlocks and lost updates. The heavier ones are ignored by
//! default:
//!
//! ```bash
//! cargo test -p docstore-common-storage --test concurrent_stress -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::panic)]

use std::{collections::HashSet, time::Duration};

use docstore_common_storage::{
    EntityKey, KeyQuery, MemoryBackend, StorageBackend,
    testutil::{make_key, make_tagged_value},
};
use tokio::task::JoinSet;

/// Number of concurrent tasks for most tests.
const CONCURRENCY: usize = 16;

/// Number of operations each task performs.
const OPS_PER_TASK: usize = 50;

fn counter_key() -> EntityKey {
    EntityKey::new("counters", "shared").expect("valid key")
}

fn read_amount(bytes: Option<bytes::Bytes>) -> u64 {
    bytes.map(|b| String::from_utf8_lossy(&b).parse().expect("numeric value")).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Test: Parallel writers to the same entity (last writer wins)
// ---------------------------------------------------------------------------

/// The entity must hold a well-formed value written by one of the tasks.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_writers_same_entity() {
    let backend = MemoryBackend::new();
    let key = counter_key();

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let backend = backend.clone();
        let key = key.clone();
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                backend.put(&key, make_tagged_value(task_id, i)).await.expect("put should succeed");
            }
        });
    }

    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let value = backend.get(&key).await.expect("get").expect("entity should exist");
    let s = String::from_utf8(value.to_vec()).expect("value should be valid utf-8");
    assert!(s.starts_with("task"), "value should be from one of the writer tasks, got: {s}");
}

// ---------------------------------------------------------------------------
// Test: Parallel transactional increments never lose an update
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn parallel_transactional_increments_sum_exactly() {
    let backend = MemoryBackend::with_lock_timeout(Duration::from_secs(30));

    let mut set = JoinSet::new();
    for _ in 0..CONCURRENCY {
        let backend = backend.clone();
        set.spawn(async move {
            for _ in 0..OPS_PER_TASK {
                let mut txn = backend.transaction().await.expect("begin");
                let current = read_amount(txn.get(&counter_key()).await.expect("txn get"));
                txn.put(counter_key(), (current + 1).to_string().into_bytes());
                txn.commit().await.expect("commit");
            }
        });
    }

    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let total = read_amount(backend.get(&counter_key()).await.expect("get"));
    assert_eq!(total, (CONCURRENCY * OPS_PER_TASK) as u64);
}

// ---------------------------------------------------------------------------
// Test: Disjoint writers to distinct entities
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_writers_disjoint_entities() {
    let backend = MemoryBackend::new();

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let backend = backend.clone();
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                let key = make_key("disjoint", task_id * OPS_PER_TASK + i);
                backend.put(&key, make_tagged_value(task_id, i)).await.expect("put");
            }
        });
    }

    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    let query = KeyQuery::new("disjoint").expect("valid query");
    assert_eq!(backend.count(&query).await.expect("count"), CONCURRENCY * OPS_PER_TASK);
}

// ---------------------------------------------------------------------------
// Test: Transactions on disjoint entities do not block each other
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disjoint_transactions_commit_independently() {
    let backend = MemoryBackend::with_lock_timeout(Duration::from_millis(500));

    // Hold one entity for the whole test.
    let mut holder = backend.transaction().await.expect("begin holder");
    let _ = holder.get(&counter_key()).await.expect("claim");

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let backend = backend.clone();
        set.spawn(async move {
            let key = make_key("independent", task_id);
            let mut txn = backend.transaction().await.expect("begin");
            let _ = txn.get(&key).await.expect("get");
            txn.put(key, b"1".to_vec());
            txn.commit().await.expect("commit should not wait on unrelated entity");
            task_id
        });
    }

    let mut finished = HashSet::new();
    while let Some(result) = set.join_next().await {
        finished.insert(result.expect("task should not panic"));
    }
    assert_eq!(finished.len(), CONCURRENCY);

    holder.rollback().await.expect("rollback holder");
}
