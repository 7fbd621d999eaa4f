//! The shared store handle and its construct-once cell.

use std::{fmt, sync::Arc};

use docstore_common_storage::StorageBackend;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    config::ConnectorConfig,
    counter::CounterService,
    entity::EntityService,
    error::Result,
    factory::{ClientFactory, StoreConnector},
    mode::ConnectionKind,
};

/// A connected store client.
///
/// Cheap to clone; every clone talks to the same client. The connection
/// mode is fixed for the life of the handle.
#[derive(Clone)]
pub struct StoreHandle {
    backend: Arc<dyn StorageBackend>,
    kind: ConnectionKind,
    project_id: Arc<str>,
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("kind", &self.kind)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl StoreHandle {
    /// Wraps a connected backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, kind: ConnectionKind, project_id: &str) -> Self {
        Self { backend, kind, project_id: Arc::from(project_id) }
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Returns the mode the handle was built in.
    #[must_use]
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Returns the project the handle addresses.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Creates a counter service over `collection`.
    #[must_use]
    pub fn counter_service(&self, collection: impl Into<String>) -> CounterService {
        CounterService::new(Arc::clone(&self.backend), collection)
    }

    /// Creates an entity service over `collection`.
    #[must_use]
    pub fn entity_service(&self, collection: impl Into<String>) -> EntityService {
        EntityService::new(Arc::clone(&self.backend), collection)
    }
}

/// A host-owned, construct-once [`StoreHandle`].
///
/// The first caller builds the handle; concurrent first callers wait for
/// that construction and every later caller reuses its result. A failed
/// construction leaves the cell empty. There is no teardown.
#[derive(Debug, Default)]
pub struct SharedStore {
    cell: OnceCell<StoreHandle>,
}

impl SharedStore {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle if one has been built.
    #[must_use]
    pub fn get(&self) -> Option<&StoreHandle> {
        self.cell.get()
    }

    /// Returns the handle, building it with `factory` on first use.
    ///
    /// `config` is only read by the call that performs construction.
    ///
    /// # Errors
    ///
    /// Returns the factory's [`ConnectorError`](crate::ConnectorError) if
    /// construction fails.
    pub async fn get_or_connect<C: StoreConnector>(
        &self,
        factory: &ClientFactory<C>,
        config: &ConnectorConfig,
    ) -> Result<StoreHandle> {
        let handle = self
            .cell
            .get_or_try_init(|| async {
                debug!("building shared store handle");
                factory.build(config).await
            })
            .await?;
        Ok(handle.clone())
    }
}
