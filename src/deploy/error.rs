// ABOUTME: Deployment failure classification.
// ABOUTME: Every failure maps to one reportable kind.

use crate::credential::CredentialError;
use serde::Serialize;
use thiserror::Error;

/// Why a deployment failed, before or during transfer.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("transfer error: {0}")]
    Transfer(String),

    #[error("session lost: {0}")]
    SessionLost(String),
}

/// Coarse failure category carried into reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployErrorKind {
    Configuration,
    Connect,
    Authentication,
    Transfer,
    SessionLost,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Configuration(_) => DeployErrorKind::Configuration,
            DeployError::Connect(_) => DeployErrorKind::Connect,
            DeployError::Authentication(_) => DeployErrorKind::Authentication,
            DeployError::Transfer(_) => DeployErrorKind::Transfer,
            DeployError::SessionLost(_) => DeployErrorKind::SessionLost,
        }
    }
}

impl From<CredentialError> for DeployError {
    fn from(e: CredentialError) -> Self {
        DeployError::Configuration(e.to_string())
    }
}

impl From<crate::ssh::Error> for DeployError {
    fn from(e: crate::ssh::Error) -> Self {
        match e {
            crate::ssh::Error::AuthenticationFailed(msg) => DeployError::Authentication(msg),
            other => DeployError::Connect(other.to_string()),
        }
    }
}
