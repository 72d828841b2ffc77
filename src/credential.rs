// ABOUTME: Credential resolution from declared auth parameters.
// ABOUTME: Materializes key bytes; passphrase validation is deferred to auth.

use crate::config::AuthConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing required auth field: {0}")]
    MissingField(&'static str),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("no managed key registered under id '{0}'")]
    UnknownManagedKey(String),
}

pub type Result<T> = std::result::Result<T, CredentialError>;

/// A concrete authentication strategy for one deployment.
///
/// Key material is read fully into memory at resolution time and never
/// mutated. An encrypted key with a missing or wrong passphrase still
/// resolves; the mismatch surfaces as an authentication error when the key
/// is decoded during session establishment.
#[derive(Clone)]
pub enum Credential {
    Password {
        username: String,
        password: String,
    },
    PrivateKey {
        username: String,
        key_pem: String,
        passphrase: Option<String>,
    },
    ManagedKey {
        username: String,
        key_id: String,
        key_pem: String,
        passphrase: Option<String>,
    },
}

impl Credential {
    pub fn username(&self) -> &str {
        match self {
            Credential::Password { username, .. }
            | Credential::PrivateKey { username, .. }
            | Credential::ManagedKey { username, .. } => username,
        }
    }

    /// Name of the single SSH auth method this credential offers.
    pub fn method_name(&self) -> &'static str {
        match self {
            Credential::Password { .. } => "password",
            Credential::PrivateKey { .. } | Credential::ManagedKey { .. } => "publickey",
        }
    }
}

// Key material stays out of debug output.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Credential::PrivateKey { username, .. } => f
                .debug_struct("PrivateKey")
                .field("username", username)
                .finish_non_exhaustive(),
            Credential::ManagedKey {
                username, key_id, ..
            } => f
                .debug_struct("ManagedKey")
                .field("username", username)
                .field("key_id", key_id)
                .finish_non_exhaustive(),
        }
    }
}

/// A private key handed out by an external key-management service.
#[derive(Debug, Clone)]
pub struct StoredKey {
    pub key_pem: String,
    /// Whether the key material is passphrase-protected.
    pub encrypted: bool,
}

/// Narrow capability for looking up managed keys by id.
pub trait KeyStore: Send + Sync {
    fn fetch(&self, key_id: &str) -> Option<StoredKey>;
}

/// Key store over a directory of PEM files named by key id.
pub struct DirKeyStore {
    dir: PathBuf,
}

impl DirKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl KeyStore for DirKeyStore {
    fn fetch(&self, key_id: &str) -> Option<StoredKey> {
        // Key ids are opaque labels; refuse anything path-like.
        if key_id.contains('/') || key_id.contains("..") {
            return None;
        }
        let path = self.dir.join(key_id);
        let key_pem = std::fs::read_to_string(&path).ok()?;
        let encrypted = key_pem.contains("ENCRYPTED");
        Some(StoredKey { key_pem, encrypted })
    }
}

/// Key store with no registered keys, for configurations without one.
pub struct NoKeys;

impl KeyStore for NoKeys {
    fn fetch(&self, _key_id: &str) -> Option<StoredKey> {
        None
    }
}

/// Turn the declared auth method into a concrete credential.
///
/// Fails with a configuration-class error when required fields are empty or
/// a referenced key cannot be located or read.
pub fn resolve(auth: &AuthConfig, keys: &dyn KeyStore) -> Result<Credential> {
    auth.validate()
        .map_err(|e| match e {
            crate::config::AuthConfigError::MissingField(field) => {
                CredentialError::MissingField(field)
            }
        })?;

    match auth {
        AuthConfig::Password { username, password } => Ok(Credential::Password {
            username: username.clone(),
            password: password.clone(),
        }),

        AuthConfig::PrivateKey {
            username,
            key_file,
            passphrase,
        } => {
            let key_pem = read_key_file(key_file)?;
            tracing::debug!(key_file = %key_file.display(), "loaded private key");
            Ok(Credential::PrivateKey {
                username: username.clone(),
                key_pem,
                passphrase: passphrase.clone(),
            })
        }

        AuthConfig::ManagedKey {
            username,
            key_id,
            passphrase,
        } => {
            let stored = keys
                .fetch(key_id)
                .ok_or_else(|| CredentialError::UnknownManagedKey(key_id.clone()))?;
            if stored.encrypted && passphrase.is_none() {
                tracing::debug!(key_id = %key_id, "managed key is encrypted, no passphrase configured");
            }
            Ok(Credential::ManagedKey {
                username: username.clone(),
                key_id: key_id.clone(),
                key_pem: stored.key_pem,
                passphrase: passphrase.clone(),
            })
        }
    }
}

fn read_key_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| CredentialError::KeyLoadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapKeyStore(HashMap<String, StoredKey>);

    impl KeyStore for MapKeyStore {
        fn fetch(&self, key_id: &str) -> Option<StoredKey> {
            self.0.get(key_id).cloned()
        }
    }

    #[test]
    fn password_resolves() {
        let auth = AuthConfig::Password {
            username: "deploy".into(),
            password: "secret".into(),
        };
        let credential = resolve(&auth, &NoKeys).unwrap();
        assert!(matches!(credential, Credential::Password { .. }));
        assert_eq!(credential.method_name(), "password");
    }

    #[test]
    fn missing_key_file_is_a_configuration_error() {
        let auth = AuthConfig::PrivateKey {
            username: "deploy".into(),
            key_file: "/nonexistent/key".into(),
            passphrase: None,
        };
        let err = resolve(&auth, &NoKeys).unwrap_err();
        assert!(matches!(err, CredentialError::KeyLoadFailed { .. }));
    }

    #[test]
    fn unknown_managed_key_is_a_configuration_error() {
        let auth = AuthConfig::ManagedKey {
            username: "deploy".into(),
            key_id: "missing".into(),
            passphrase: None,
        };
        let err = resolve(&auth, &NoKeys).unwrap_err();
        assert!(matches!(err, CredentialError::UnknownManagedKey(_)));
    }

    #[test]
    fn managed_key_materializes_bytes() {
        let mut keys = HashMap::new();
        keys.insert(
            "ci".to_string(),
            StoredKey {
                key_pem: "KEYDATA".into(),
                encrypted: false,
            },
        );
        let auth = AuthConfig::ManagedKey {
            username: "deploy".into(),
            key_id: "ci".into(),
            passphrase: None,
        };
        let credential = resolve(&auth, &MapKeyStore(keys)).unwrap();
        match credential {
            Credential::ManagedKey { key_pem, key_id, .. } => {
                assert_eq!(key_pem, "KEYDATA");
                assert_eq!(key_id, "ci");
            }
            other => panic!("unexpected credential: {other:?}"),
        }
    }

    #[test]
    fn encrypted_key_without_passphrase_still_resolves() {
        let mut keys = HashMap::new();
        keys.insert(
            "enc".to_string(),
            StoredKey {
                key_pem: "ENCRYPTED KEYDATA".into(),
                encrypted: true,
            },
        );
        let auth = AuthConfig::ManagedKey {
            username: "deploy".into(),
            key_id: "enc".into(),
            passphrase: None,
        };
        // Passphrase mismatch is an authentication-time failure, not ours.
        assert!(resolve(&auth, &MapKeyStore(keys)).is_ok());
    }

    #[test]
    fn empty_username_rejected() {
        let auth = AuthConfig::Password {
            username: "".into(),
            password: "p".into(),
        };
        let err = resolve(&auth, &NoKeys).unwrap_err();
        assert!(matches!(err, CredentialError::MissingField("username")));
    }

    #[test]
    fn dir_key_store_refuses_path_like_ids() {
        let store = DirKeyStore::new("/tmp");
        assert!(store.fetch("../etc/passwd").is_none());
    }

    #[test]
    fn debug_output_hides_key_material() {
        let credential = Credential::PrivateKey {
            username: "u".into(),
            key_pem: "SUPERSECRET".into(),
            passphrase: Some("alsosecret".into()),
        };
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("SUPERSECRET"));
        assert!(!rendered.contains("alsosecret"));
    }
}
