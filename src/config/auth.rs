// ABOUTME: Authentication method selection from configuration.
// ABOUTME: Tagged by `method:` — password, private-key or managed-key.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthConfigError {
    #[error("missing required auth field: {0}")]
    MissingField(&'static str),
}

/// Declared authentication method and its parameters.
///
/// Exactly one variant is active per deployment; the credential resolver
/// turns this into a concrete [`crate::credential::Credential`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum AuthConfig {
    Password {
        username: String,
        password: String,
    },

    PrivateKey {
        username: String,
        key_file: PathBuf,
        #[serde(default)]
        passphrase: Option<String>,
    },

    ManagedKey {
        username: String,
        key_id: String,
        #[serde(default)]
        passphrase: Option<String>,
    },
}

impl AuthConfig {
    pub fn username(&self) -> &str {
        match self {
            AuthConfig::Password { username, .. }
            | AuthConfig::PrivateKey { username, .. }
            | AuthConfig::ManagedKey { username, .. } => username,
        }
    }

    /// Reject empty required fields that serde cannot catch.
    pub fn validate(&self) -> Result<(), AuthConfigError> {
        if self.username().trim().is_empty() {
            return Err(AuthConfigError::MissingField("username"));
        }
        match self {
            AuthConfig::Password { password, .. } => {
                if password.is_empty() {
                    return Err(AuthConfigError::MissingField("password"));
                }
            }
            AuthConfig::PrivateKey { key_file, .. } => {
                if key_file.as_os_str().is_empty() {
                    return Err(AuthConfigError::MissingField("key_file"));
                }
            }
            AuthConfig::ManagedKey { key_id, .. } => {
                if key_id.trim().is_empty() {
                    return Err(AuthConfigError::MissingField("key_id"));
                }
            }
        }
        Ok(())
    }
}
