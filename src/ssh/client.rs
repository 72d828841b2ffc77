// ABOUTME: SSH session management using russh.
// ABOUTME: Bounded connect/auth timeouts; single-method authentication.

use super::error::{Error, Result};
use crate::credential::Credential;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::known_hosts::{check_known_hosts, check_known_hosts_path};
use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key, ssh_key};
use russh::{Channel, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for establishing an SSH session.
///
/// The username lives on the [`Credential`], not here: the target and the
/// identity are resolved independently.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Bound on TCP connect plus key exchange.
    pub connect_timeout: Duration,
    /// Bound on the authentication exchange.
    pub auth_timeout: Duration,
    /// Host key verification policy.
    pub host_verification: HostVerification,
}

/// How to treat the host key presented by the server.
///
/// `AcceptAny` is the default; stricter verification is a configuration
/// extension, not a default behavior change.
#[derive(Debug, Clone, Default)]
pub enum HostVerification {
    #[default]
    AcceptAny,
    KnownHosts {
        /// Known-hosts file; `None` uses the default ~/.ssh/known_hosts.
        path: Option<PathBuf>,
    },
}

impl SessionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            connect_timeout: Duration::from_secs(30),
            auth_timeout: Duration::from_secs(30),
            host_verification: HostVerification::AcceptAny,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn host_verification(mut self, policy: HostVerification) -> Self {
        self.host_verification = policy;
        self
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// SSH client handler for russh.
struct ClientHandler {
    host: String,
    port: u16,
    verification: HostVerification,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match &self.verification {
            HostVerification::AcceptAny => Ok(true),
            HostVerification::KnownHosts { path } => {
                let check = match path {
                    Some(path) => {
                        check_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => check_known_hosts(&self.host, self.port, server_public_key),
                };
                match check {
                    Ok(known) => Ok(known),
                    Err(e) => {
                        tracing::warn!(host = %self.host, error = %e, "known_hosts check failed");
                        Ok(false)
                    }
                }
            }
        }
    }
}

/// An established, authenticated SSH session.
///
/// Owns exactly one network connection. The deployment engine holds the
/// session exclusively for one deployment and closes it on every exit path.
pub struct Session {
    handle: Handle<ClientHandler>,
    host: String,
    port: u16,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the target and authenticate with the resolved credential.
    ///
    /// The client offers only the single method selected by the credential
    /// tag; it never probes multiple methods. A rejected credential, an
    /// undecodable key, or a wrong passphrase all surface here as
    /// [`Error::AuthenticationFailed`].
    pub async fn establish(config: &SessionConfig, credential: &Credential) -> Result<Self> {
        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let handler = ClientHandler {
            host: config.host.clone(),
            port: config.port,
            verification: config.host_verification.clone(),
        };

        tracing::debug!(addr = %config.addr(), "connecting");
        let connect = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        );
        let mut handle = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| Error::ConnectTimeout(config.addr()))?
            .map_err(|e| Error::Connect(e.to_string()))?;

        let authenticated = tokio::time::timeout(
            config.auth_timeout,
            Self::authenticate(&mut handle, credential),
        )
        .await
        .map_err(|_| Error::AuthenticationFailed("authentication timed out".to_string()))??;

        if !authenticated {
            return Err(Error::AuthenticationFailed(format!(
                "{} auth rejected for user {}",
                credential.method_name(),
                credential.username()
            )));
        }

        tracing::debug!(addr = %config.addr(), user = %credential.username(), "session established");
        Ok(Self {
            handle,
            host: config.host.clone(),
            port: config.port,
        })
    }

    /// Offer the single auth method carried by the credential.
    async fn authenticate(
        handle: &mut Handle<ClientHandler>,
        credential: &Credential,
    ) -> Result<bool> {
        match credential {
            Credential::Password { username, password } => {
                let result = handle
                    .authenticate_password(username, password)
                    .await
                    .map_err(|e| Error::Connect(e.to_string()))?;
                Ok(result.success())
            }

            Credential::PrivateKey {
                username,
                key_pem,
                passphrase,
            }
            | Credential::ManagedKey {
                username,
                key_pem,
                passphrase,
                ..
            } => {
                // Passphrase validation happens here, not at resolution.
                let key = decode_secret_key(key_pem, passphrase.as_deref()).map_err(|e| {
                    Error::AuthenticationFailed(format!("private key rejected: {e}"))
                })?;

                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(|e| Error::Connect(e.to_string()))?
                    .flatten();

                let result = handle
                    .authenticate_publickey(
                        username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(|e| Error::Connect(e.to_string()))?;
                Ok(result.success())
            }
        }
    }

    /// Open a fresh channel on this session for a transfer subprotocol.
    pub async fn open_channel(&self) -> Result<Channel<Msg>> {
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| Error::ChannelOpen(e.to_string()))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Disconnect the session. Consumes the session; any channel still open
    /// on top of it is aborted by the transport.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}
