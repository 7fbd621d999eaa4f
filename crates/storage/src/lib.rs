//! Shared document store abstraction for docstore services.
//!
//! This crate provides the [`StorageBackend`] trait and related types that the
//! counter and entity services build on. Entities live in named collections
//! and are addressed by an [`EntityKey`]; values cross the trait as opaque
//! bytes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! │          CounterService │ EntityService (connector)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                docstore-common-storage                      │
//! │              StorageBackend trait                           │
//! │       (get, put, delete, count, transaction)                │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│        managed store client                  │
//! │   (testing)  │   (plugged in through a StoreConnector)      │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use docstore_common_storage::{EntityKey, MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!     let key = EntityKey::new("counters", "visits")?;
//!
//!     // Store a value
//!     backend.put(&key, br#"{"Amount":1}"#.to_vec()).await?;
//!
//!     // Retrieve it
//!     let value = backend.get(&key).await?;
//!     assert!(value.is_some());
//!
//!     // Use transactions for read-modify-write sequences
//!     let mut txn = backend.transaction().await?;
//!     let _current = txn.get(&key).await?;
//!     txn.put(key.clone(), br#"{"Amount":2}"#.to_vec());
//!     txn.commit().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Backends map their internal
//! errors onto the [`StorageError`] variants.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` and `conformance` modules (key generators, assertion
//!   macros, backend conformance checks). Enable this in `[dev-dependencies]` for integration
//!   tests.
//! - **`failpoints`**: Compiles the `fail` crate's injection points into [`MemoryBackend`].

#![deny(unsafe_code)]

pub mod backend;
pub mod codec;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod conformance;
pub mod error;
pub mod key;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod transaction;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use codec::{decode_entity, encode_entity};
pub use error::{BoxError, StorageError, StorageResult};
pub use key::{EntityKey, KeyQuery, MAX_NAME_LEN, collection_prefix};
pub use memory::{DEFAULT_LOCK_TIMEOUT, MemoryBackend};
pub use transaction::Transaction;
