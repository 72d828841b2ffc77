// ABOUTME: SSH-specific error types.
// ABOUTME: Separates connect-class from authentication-class failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("failed to open channel: {0}")]
    ChannelOpen(String),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
