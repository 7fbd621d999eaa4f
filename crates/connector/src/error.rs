//! Error types for store client construction.
//!
//! Counter and entity operations report through
//! [`StorageError`](docstore_common_storage::StorageError) and
//! [`CounterError`](crate::CounterError). [`ConnectorError`] covers everything
//! that can go wrong before a store handle exists: bad configuration, an
//! unreadable or malformed keyfile, or a connector that refuses to connect.
//! Hosts treat it as fatal.

use std::path::PathBuf;

use docstore_common_storage::{BoxError, StorageError};
use thiserror::Error;

/// Result type alias for client construction.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors raised while building a store handle.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`, new variants may be added in
/// future minor releases. Downstream match expressions must include a
/// wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectorError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Service-account credentials could not be parsed or used.
    #[error("Credentials error: {message}")]
    Credentials {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// A credentials file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The store client could not be created.
    #[error("Failed to connect to store: {0}")]
    Connect(#[from] StorageError),
}

impl ConnectorError {
    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a new `Credentials` error without a source.
    #[must_use]
    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials { message: message.into(), source: None }
    }

    /// Creates a new `Credentials` error with a source.
    #[must_use]
    pub fn credentials_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Credentials { message: message.into(), source: Some(std::sync::Arc::new(source)) }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_io_display_includes_path() {
        let err = ConnectorError::Io {
            path: PathBuf::from("/secrets/keyfile.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("/secrets/keyfile.json"), "got: {rendered}");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_connect_wraps_storage_error() {
        let err: ConnectorError = StorageError::connection("refused").into();
        assert!(matches!(err, ConnectorError::Connect(StorageError::Connection { .. })));
    }

    #[test]
    fn test_credentials_source_chain() {
        let inner = std::io::Error::other("bad pem");
        let err = ConnectorError::credentials_with_source("invalid private key", inner);
        assert_eq!(err.to_string(), "Credentials error: invalid private key");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("bad pem"));
    }
}
