//! Connection mode selection.
//!
//! A store handle authenticates in exactly one of three ways, chosen once
//! from configuration and fixed for the life of the handle.

use std::{fmt, path::PathBuf};

/// How a store handle connects and authenticates.
///
/// Each variant carries only the settings its mode consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Ambient default credentials against the managed store.
    Simple,

    /// A local emulator instance.
    ///
    /// An empty `address` defers to the `DATASTORE_EMULATOR_HOST`
    /// environment variable at construction time.
    Emulator {
        /// Emulator `host:port`.
        address: String,
    },

    /// A service-account keyfile under `credentials_dir`.
    Keyfile {
        /// Directory containing `keyfile.json`.
        credentials_dir: PathBuf,
    },
}

impl ConnectionMode {
    /// Picks the connection mode for a configuration.
    ///
    /// The emulator flag wins outright. Otherwise a non-empty credentials
    /// path selects [`Keyfile`](Self::Keyfile), and anything else falls back
    /// to [`Simple`](Self::Simple).
    #[must_use]
    pub fn select(emulator_enabled: bool, emulator_address: &str, credentials_path: &str) -> Self {
        if emulator_enabled {
            Self::Emulator { address: emulator_address.to_owned() }
        } else if !credentials_path.is_empty() {
            Self::Keyfile { credentials_dir: PathBuf::from(credentials_path) }
        } else {
            Self::Simple
        }
    }

    /// Returns the field-less discriminant of this mode.
    #[must_use]
    pub fn kind(&self) -> ConnectionKind {
        match self {
            Self::Simple => ConnectionKind::Simple,
            Self::Emulator { .. } => ConnectionKind::Emulator,
            Self::Keyfile { .. } => ConnectionKind::Keyfile,
        }
    }
}

/// The three connection modes without their settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// Ambient default credentials.
    Simple,
    /// Local emulator.
    Emulator,
    /// Service-account keyfile.
    Keyfile,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "SIMPLE",
            Self::Emulator => "EMULATOR",
            Self::Keyfile => "KEYFILE",
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::emulator_only(true, "", ConnectionKind::Emulator)]
    #[case::emulator_beats_keyfile(true, "/secrets", ConnectionKind::Emulator)]
    #[case::keyfile(false, "/secrets", ConnectionKind::Keyfile)]
    #[case::simple(false, "", ConnectionKind::Simple)]
    fn test_select_precedence(
        #[case] emulator_enabled: bool,
        #[case] credentials_path: &str,
        #[case] expected: ConnectionKind,
    ) {
        let mode = ConnectionMode::select(emulator_enabled, "localhost:8081", credentials_path);
        assert_eq!(mode.kind(), expected);
    }

    #[test]
    fn test_variants_carry_their_settings() {
        assert_eq!(
            ConnectionMode::select(true, "localhost:8081", "/ignored"),
            ConnectionMode::Emulator { address: "localhost:8081".into() }
        );
        assert_eq!(
            ConnectionMode::select(false, "ignored:1", "/secrets"),
            ConnectionMode::Keyfile { credentials_dir: PathBuf::from("/secrets") }
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ConnectionKind::Simple.to_string(), "SIMPLE");
        assert_eq!(ConnectionKind::Emulator.to_string(), "EMULATOR");
        assert_eq!(ConnectionKind::Keyfile.to_string(), "KEYFILE");
    }
}
