//! Atomic counters, entity CRUD and store client construction for docstore
//! services.
//!
//! This crate builds on the [`StorageBackend`](docstore_common_storage::StorageBackend)
//! contract from `docstore-common-storage`:
//!
//! - [`CounterService`]: named non-negative counters updated by transactional read-modify-write,
//!   so concurrent increments never lose updates
//! - [`EntityService`]: unconditional save/update, retrieve, delete and existence checks
//! - [`ClientFactory`]: picks one of three connection modes from a [`ConnectorConfig`] and yields
//!   a [`StoreHandle`] both services share
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               CounterService │ EntityService                │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      StoreHandle                            │
//! │            (Arc<dyn StorageBackend>, mode)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │   ClientFactory ── ConnectionMode ── StoreConnector         │
//! │     SIMPLE: default credentials                             │
//! │     EMULATOR: explicit endpoint                             │
//! │     KEYFILE: service-account token source                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use docstore_connector::{
//!     AtomicCounter, ClientFactory, ConnectorConfig, EntityStore, MemoryConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectorConfig::builder()
//!         .project_id("local")
//!         .collection("application")
//!         .emulator_enabled(true)
//!         .emulator_address("localhost:8081")
//!         .build()?;
//!
//!     let handle = ClientFactory::new(MemoryConnector::new()).build(&config).await?;
//!
//!     let counters = handle.counter_service(config.collection());
//!     counters.increment("signups", 1).await;
//!     assert_eq!(counters.count("signups").await, 1);
//!
//!     let entities = handle.entity_service(config.collection());
//!     entities.save("app-1", &serde_json::json!({ "name": "billing" })).await?;
//!     assert!(entities.exists("app-1").await);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`failpoints`**: Forwards to `docstore-common-storage/failpoints` so integration tests can
//!   inject store failures beneath the services.

#![deny(unsafe_code)]

pub mod config;
pub mod counter;
pub mod credentials;
pub mod entity;
pub mod error;
pub mod factory;
pub mod handle;
pub mod mode;

pub use config::ConnectorConfig;
pub use counter::{
    AtomicCounter, Counter, CounterError, CounterErrorHook, CounterOperation, CounterService,
};
pub use credentials::{
    AssertionClaims, Credentials, DATASTORE_SCOPE, KEYFILE_NAME, ServiceAccountKey,
    ServiceAccountTokenSource, load_keyfile,
};
pub use entity::{EntityService, EntityStore};
pub use error::{ConnectorError, Result};
pub use factory::{
    ClientFactory, ClientOptions, EMULATOR_HOST_ENV, MemoryConnector, StoreConnector,
    resolve_options,
};
pub use handle::{SharedStore, StoreHandle};
pub use mode::{ConnectionKind, ConnectionMode};
