//! Store client construction.
//!
//! [`ClientFactory`] resolves a [`ConnectorConfig`] into [`ClientOptions`]
//! (endpoint plus credentials for the selected [`ConnectionMode`]) and hands
//! them to a [`StoreConnector`], the seam where a concrete managed-store
//! client plugs in. [`MemoryConnector`] connects every mode to an in-memory
//! backend for tests and local development.

use std::{fmt, path::Path, sync::Arc};

use async_trait::async_trait;
use docstore_common_storage::{MemoryBackend, StorageBackend, StorageResult};
use parking_lot::Mutex;
use tracing::{error, info, instrument};

use crate::{
    config::ConnectorConfig,
    credentials::{Credentials, DATASTORE_SCOPE, ServiceAccountTokenSource, load_keyfile},
    error::{ConnectorError, Result},
    handle::StoreHandle,
    mode::{ConnectionKind, ConnectionMode},
};

/// Environment variable consulted when emulator mode has no address.
pub const EMULATOR_HOST_ENV: &str = "DATASTORE_EMULATOR_HOST";

/// Everything a [`StoreConnector`] needs to create a client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    project_id: String,
    endpoint: Option<String>,
    credentials: Credentials,
}

impl ClientOptions {
    /// Creates options for `project_id`.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        endpoint: Option<String>,
        credentials: Credentials,
    ) -> Self {
        Self { project_id: project_id.into(), endpoint, credentials }
    }

    /// Returns the project identifier.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the explicit endpoint, set only in emulator mode.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the credentials the client authenticates with.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Creates store clients from resolved options.
///
/// Implementations map client-creation failures onto
/// [`StorageError`](docstore_common_storage::StorageError), typically
/// `Connection`.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Creates a client for `options`.
    async fn connect(&self, options: &ClientOptions) -> StorageResult<Arc<dyn StorageBackend>>;
}

/// Builds [`StoreHandle`]s through a [`StoreConnector`].
///
/// # Example
///
/// ```
/// use docstore_connector::{ClientFactory, ConnectionKind, ConnectorConfig, MemoryConnector};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let config = ConnectorConfig::builder()
///     .project_id("local")
///     .collection("application")
///     .emulator_enabled(true)
///     .emulator_address("localhost:8081")
///     .build()
///     .unwrap();
///
/// let factory = ClientFactory::new(MemoryConnector::new());
/// let handle = factory.build(&config).await.unwrap();
/// assert_eq!(handle.kind(), ConnectionKind::Emulator);
/// # });
/// ```
pub struct ClientFactory<C> {
    connector: C,
}

impl<C> fmt::Debug for ClientFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory").finish_non_exhaustive()
    }
}

impl<C: StoreConnector> ClientFactory<C> {
    /// Creates a factory around `connector`.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Returns the wrapped connector.
    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Builds a store handle for `config`.
    ///
    /// Failures are logged at `error` level before being returned; hosts
    /// treat them as fatal.
    ///
    /// # Errors
    ///
    /// - [`ConnectorError::Config`] if the configuration is invalid or emulator mode has no
    ///   address
    /// - [`ConnectorError::Io`] / [`ConnectorError::Credentials`] if the keyfile cannot be used
    /// - [`ConnectorError::Connect`] if the connector fails
    #[instrument(skip(self, config), fields(project_id = config.project_id()))]
    pub async fn build(&self, config: &ConnectorConfig) -> Result<StoreHandle> {
        let result = self.try_build(config).await;
        if let Err(err) = &result {
            error!(error = %err, "failed to create store client");
        }
        result
    }

    async fn try_build(&self, config: &ConnectorConfig) -> Result<StoreHandle> {
        config.validate()?;

        let mode = config.connection_mode();
        let options = resolve_options(config.project_id(), &mode, env_emulator_host())?;
        let backend = self.connector.connect(&options).await?;

        info!(mode = %mode.kind(), "store client created");
        Ok(StoreHandle::new(backend, mode.kind(), config.project_id()))
    }
}

fn env_emulator_host() -> Option<String> {
    std::env::var(EMULATOR_HOST_ENV).ok()
}

/// Resolves the client options for `mode`.
///
/// `env_emulator_host` is the value of [`EMULATOR_HOST_ENV`], used only when
/// emulator mode has an empty address.
///
/// # Errors
///
/// Returns [`ConnectorError::Config`] if emulator mode has no address from
/// either source, and the keyfile errors of [`load_keyfile`] and
/// [`ServiceAccountTokenSource::new`] in keyfile mode.
pub fn resolve_options(
    project_id: &str,
    mode: &ConnectionMode,
    env_emulator_host: Option<String>,
) -> Result<ClientOptions> {
    match mode {
        ConnectionMode::Simple => Ok(ClientOptions::new(project_id, None, Credentials::Default)),
        ConnectionMode::Emulator { address } => {
            let endpoint = Some(address.clone())
                .filter(|a| !a.is_empty())
                .or_else(|| env_emulator_host.filter(|a| !a.is_empty()))
                .ok_or_else(|| {
                    ConnectorError::config(format!(
                        "emulator enabled but no address configured and {EMULATOR_HOST_ENV} is unset"
                    ))
                })?;
            Ok(ClientOptions::new(project_id, Some(endpoint), Credentials::None))
        },
        ConnectionMode::Keyfile { credentials_dir } => {
            let source = keyfile_token_source(credentials_dir)?;
            Ok(ClientOptions::new(project_id, None, Credentials::ServiceAccount(Arc::new(source))))
        },
    }
}

fn keyfile_token_source(credentials_dir: &Path) -> Result<ServiceAccountTokenSource> {
    let key = load_keyfile(credentials_dir)?;
    ServiceAccountTokenSource::new(key, DATASTORE_SCOPE)
}

/// Connects every mode to one shared [`MemoryBackend`].
///
/// Records the options of each connection so tests can assert what a real
/// client would have received.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    backend: MemoryBackend,
    connections: Arc<Mutex<Vec<ClientOptions>>>,
}

impl MemoryConnector {
    /// Creates a connector with an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector serving `backend`.
    #[must_use]
    pub fn with_backend(backend: MemoryBackend) -> Self {
        Self { backend, connections: Arc::default() }
    }

    /// Returns the backend every connection shares.
    #[must_use]
    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    /// Returns the options of every connection made so far.
    #[must_use]
    pub fn connections(&self) -> Vec<ClientOptions> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, options: &ClientOptions) -> StorageResult<Arc<dyn StorageBackend>> {
        self.connections.lock().push(options.clone());
        Ok(Arc::new(self.backend.clone()))
    }
}

impl ConnectionKind {
    /// Returns the kind whose options `options` carry.
    #[must_use]
    pub fn of(options: &ClientOptions) -> Self {
        match (options.endpoint(), options.credentials()) {
            (Some(_), _) => Self::Emulator,
            (None, Credentials::ServiceAccount(_)) => Self::Keyfile,
            (None, _) => Self::Simple,
        }
    }
}
