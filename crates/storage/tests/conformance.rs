//! Conformance test suite for `MemoryBackend`.
//!
//! Each test function corresponds to a single conformance check, providing
//! fine-grained failure reporting.

#![allow(clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use docstore_common_storage::{MemoryBackend, conformance};

// ============================================================================
// CRUD (5 tests)
// ============================================================================

#[tokio::test]
async fn crud_get_returns_none_for_missing_key() {
    conformance::crud_get_returns_none_for_missing_key(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_put_then_get_returns_value() {
    conformance::crud_put_then_get_returns_value(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_put_overwrites_existing() {
    conformance::crud_put_overwrites_existing(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_delete_nonexistent_is_noop() {
    conformance::crud_delete_nonexistent_is_noop(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_delete_removes_key() {
    conformance::crud_delete_removes_key(&MemoryBackend::new()).await;
}

// ============================================================================
// Count (2 tests)
// ============================================================================

#[tokio::test]
async fn count_is_scoped_to_collection() {
    conformance::count_is_scoped_to_collection(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn count_with_key_filter() {
    conformance::count_with_key_filter(&MemoryBackend::new()).await;
}

// ============================================================================
// Transaction (5 tests)
// ============================================================================

#[tokio::test]
async fn txn_commit_applies_writes() {
    conformance::txn_commit_applies_writes(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn txn_rollback_discards_writes() {
    conformance::txn_rollback_discards_writes(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn txn_read_your_writes() {
    conformance::txn_read_your_writes(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn txn_writes_invisible_before_commit() {
    conformance::txn_writes_invisible_before_commit(&MemoryBackend::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn txn_concurrent_read_modify_write_is_isolated() {
    conformance::txn_concurrent_read_modify_write_is_isolated(Arc::new(MemoryBackend::new())).await;
}
