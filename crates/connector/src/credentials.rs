//! Service-account credentials for keyfile mode.
//!
//! A keyfile is the JSON document a cloud console issues for a service
//! account. [`load_keyfile`] reads it from the fixed name [`KEYFILE_NAME`]
//! under the configured directory, and [`ServiceAccountTokenSource`] turns it
//! into signed RS256 bearer assertions scoped to [`DATASTORE_SCOPE`], which
//! a store client exchanges for access tokens.

use std::{fmt, path::Path, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ConnectorError, Result};

/// File name of the service-account key inside the credentials directory.
pub const KEYFILE_NAME: &str = "keyfile.json";

/// OAuth2 scope granting access to the document store.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Token endpoint used when a keyfile omits `token_uri`.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime of a minted assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

/// A parsed service-account keyfile.
///
/// Fields the connector does not use (`auth_uri`, certificate URLs) are
/// ignored. The private key is zeroed on drop and never printed.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    key_type: String,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    private_key: Zeroizing<String>,
    client_email: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("type", &self.key_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parses a keyfile document.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Credentials`] if the document is not valid
    /// JSON, is not a `service_account` key, or has an empty `client_email`.
    pub fn from_json(json: &[u8]) -> Result<Self> {
        let key: Self = serde_json::from_slice(json)
            .map_err(|e| ConnectorError::credentials_with_source("malformed keyfile", e))?;

        if key.key_type != SERVICE_ACCOUNT_TYPE {
            return Err(ConnectorError::credentials(format!(
                "unsupported credentials type '{}', expected '{SERVICE_ACCOUNT_TYPE}'",
                key.key_type
            )));
        }

        if key.client_email.is_empty() {
            return Err(ConnectorError::credentials("client_email cannot be empty"));
        }

        Ok(key)
    }

    /// Returns the service account's email address.
    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Returns the project the key was issued in, if recorded.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Returns the key identifier, if recorded.
    #[must_use]
    pub fn private_key_id(&self) -> Option<&str> {
        self.private_key_id.as_deref()
    }

    /// Returns the token endpoint assertions are addressed to.
    #[must_use]
    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }
}

/// Reads and parses `keyfile.json` from `credentials_dir`.
///
/// # Errors
///
/// Returns [`ConnectorError::Io`] if the file cannot be read and
/// [`ConnectorError::Credentials`] if it does not parse.
pub fn load_keyfile(credentials_dir: &Path) -> Result<ServiceAccountKey> {
    let path = credentials_dir.join(KEYFILE_NAME);
    let bytes = Zeroizing::new(
        std::fs::read(&path).map_err(|source| ConnectorError::Io { path: path.clone(), source })?,
    );
    debug!(path = %path.display(), "loaded service account keyfile");
    ServiceAccountKey::from_json(&bytes)
}

/// Claims of a service-account bearer assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer, the service account email.
    pub iss: String,
    /// Space-separated OAuth2 scopes.
    pub scope: String,
    /// Audience, the token endpoint.
    pub aud: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
}

/// Mints signed assertions for one service account and scope.
#[derive(Clone)]
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("client_email", &self.key.client_email)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    /// Creates a token source from a parsed key.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Credentials`] if the private key is not a
    /// PEM-encoded RSA key.
    pub fn new(key: ServiceAccountKey, scope: impl Into<String>) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| ConnectorError::credentials_with_source("invalid private key", e))?;
        Ok(Self { key, encoding_key, scope: scope.into() })
    }

    /// Returns the scope assertions are minted for.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the underlying key.
    #[must_use]
    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }

    /// Builds the claims for an assertion issued at `now`.
    #[must_use]
    pub fn claims_at(&self, now: DateTime<Utc>) -> AssertionClaims {
        let iat = now.timestamp();
        AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat,
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        }
    }

    /// Signs an assertion issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Credentials`] if signing fails.
    pub fn assertion_at(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        encode(&header, &self.claims_at(now), &self.encoding_key)
            .map_err(|e| ConnectorError::credentials_with_source("failed to sign assertion", e))
    }

    /// Signs an assertion issued now.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Credentials`] if signing fails.
    pub fn assertion(&self) -> Result<String> {
        self.assertion_at(Utc::now())
    }
}

/// How a store client authenticates.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// No authentication, used against an emulator.
    None,
    /// Ambient default credentials discovered by the client.
    Default,
    /// A service-account token source.
    ServiceAccount(Arc<ServiceAccountTokenSource>),
}
