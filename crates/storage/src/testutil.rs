//! Shared test utilities for storage backend testing.
//!
//! This module provides helpers for building keys, seeding backends and
//! asserting on [`StorageResult`] values. It is feature-gated behind
//! `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! docstore-common-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use docstore_common_storage::testutil::{make_key, populated_backend};
//! ```

use crate::{
    StorageBackend,
    error::{StorageError, StorageResult},
    key::EntityKey,
    memory::MemoryBackend,
};

/// Create a deterministic test key in `collection`.
///
/// Names are zero-padded (`"entity-000042"`) so byte order matches numeric
/// order.
///
/// # Panics
///
/// Panics if `collection` is not a valid collection name.
#[must_use]
pub fn make_key(collection: &str, idx: usize) -> EntityKey {
    EntityKey::new(collection, format!("entity-{idx:06}")).expect("test key must be valid")
}

/// Create a test value tagged with a task ID and sequence number.
///
/// Produces values like `"task3-val042"` encoded as UTF-8 bytes. Useful for
/// concurrent tests that need to identify which task wrote which value.
#[must_use]
pub fn make_tagged_value(task: usize, seq: usize) -> Vec<u8> {
    format!("task{task}-val{seq}").into_bytes()
}

/// Create a [`MemoryBackend`] holding `count` entities in `collection`.
///
/// # Panics
///
/// Panics if any `put` fails (should not happen with `MemoryBackend`).
pub async fn populated_backend(collection: &str, count: usize) -> MemoryBackend {
    let backend = MemoryBackend::new();
    for i in 0..count {
        backend.put(&make_key(collection, i), b"{}".to_vec()).await.expect("populate put failed");
    }
    backend
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use docstore_common_storage::assert_conflict;
/// use docstore_common_storage::error::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::Conflict);
/// assert_conflict!(result);
/// ```
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::InvalidKey`].
#[macro_export]
macro_rules! assert_invalid_key {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::InvalidKey { .. })),
            "expected StorageError::InvalidKey, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// Helper to verify that a result is a `Conflict` error.
pub fn is_conflict<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::Conflict))
}

/// Helper to verify that a result is a `NotFound` error.
pub fn is_not_found<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::NotFound { .. }))
}
