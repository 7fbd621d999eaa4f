//! Configuration for store client construction.
//!
//! This module provides [`ConnectorConfig`], the settings read once when a
//! store handle is built: which connection mode to use, which project to
//! address, and which collection the services operate on.

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConnectorError, Result},
    mode::ConnectionMode,
};

/// Configuration for [`ClientFactory`](crate::ClientFactory).
///
/// # Mode Selection
///
/// - `emulator_enabled = true`: connect to `emulator_address`
/// - otherwise a non-empty `credentials_path`: authenticate with the keyfile under it
/// - otherwise: ambient default credentials
///
/// # Example
///
/// ```
/// use docstore_connector::{ConnectionKind, ConnectorConfig};
///
/// let config = ConnectorConfig::builder()
///     .project_id("billing-prod")
///     .collection("application")
///     .credentials_path("/etc/docstore")
///     .build()?;
///
/// assert_eq!(config.connection_mode().kind(), ConnectionKind::Keyfile);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorConfig {
    /// Connect to a local emulator instead of the managed store.
    #[serde(default)]
    pub(crate) emulator_enabled: bool,

    /// Emulator `host:port`.
    #[serde(default)]
    pub(crate) emulator_address: String,

    /// Directory holding `keyfile.json`.
    #[serde(default)]
    pub(crate) credentials_path: String,

    /// Project the store client addresses.
    pub(crate) project_id: String,

    /// Collection the services read and write.
    pub(crate) collection: String,
}

#[bon::bon]
impl ConnectorConfig {
    /// Creates a new configuration, validating all required fields.
    ///
    /// # Arguments
    ///
    /// * `project_id` - Project identifier. Must be non-empty.
    /// * `collection` - Collection name. Must be non-empty.
    ///
    /// # Optional Fields
    ///
    /// * `emulator_enabled` - Use the emulator (default: false).
    /// * `emulator_address` - Emulator address (default: empty).
    /// * `credentials_path` - Keyfile directory (default: empty).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] if `project_id` or `collection` is
    /// empty.
    #[builder]
    pub fn new(
        #[builder(into)] project_id: String,
        #[builder(into)] collection: String,
        #[builder(default)] emulator_enabled: bool,
        #[builder(into, default)] emulator_address: String,
        #[builder(into, default)] credentials_path: String,
    ) -> Result<Self> {
        let config =
            Self { emulator_enabled, emulator_address, credentials_path, project_id, collection };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants a deserialized configuration may have skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] if `project_id` or `collection` is
    /// empty.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.is_empty() {
            return Err(ConnectorError::config("project_id cannot be empty"));
        }

        if self.collection.is_empty() {
            return Err(ConnectorError::config("collection cannot be empty"));
        }

        Ok(())
    }

    /// Returns whether the emulator is enabled.
    #[must_use]
    pub fn emulator_enabled(&self) -> bool {
        self.emulator_enabled
    }

    /// Returns the configured emulator address.
    #[must_use]
    pub fn emulator_address(&self) -> &str {
        &self.emulator_address
    }

    /// Returns the credentials directory.
    #[must_use]
    pub fn credentials_path(&self) -> &str {
        &self.credentials_path
    }

    /// Returns the project identifier.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the connection mode these settings select.
    #[must_use]
    pub fn connection_mode(&self) -> ConnectionMode {
        ConnectionMode::select(self.emulator_enabled, &self.emulator_address, &self.credentials_path)
    }
}
