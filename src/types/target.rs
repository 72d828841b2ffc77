// ABOUTME: Deployment target type: host, port and remote base directory.
// ABOUTME: Validates the port range and non-empty fields at construction.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target host must not be empty")]
    EmptyHost,

    #[error("target port must be in 1..=65535")]
    InvalidPort,

    #[error("remote base directory must not be empty")]
    EmptyRemoteDir,
}

/// Where a deployment goes: host, SSH port and the remote base directory
/// under which artifact paths are recreated.
///
/// The remote directory may be absolute or relative to the login directory;
/// it is created on demand by the transfer strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentTarget {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub remote_dir: String,
}

fn default_port() -> u16 {
    22
}

impl DeploymentTarget {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        remote_dir: impl Into<String>,
    ) -> Result<Self, TargetError> {
        let target = Self {
            host: host.into(),
            port,
            remote_dir: remote_dir.into(),
        };
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> Result<(), TargetError> {
        if self.host.trim().is_empty() {
            return Err(TargetError::EmptyHost);
        }
        // Port 0 is the only unrepresentable-invalid value in a u16.
        if self.port == 0 {
            return Err(TargetError::InvalidPort);
        }
        if self.remote_dir.trim().is_empty() {
            return Err(TargetError::EmptyRemoteDir);
        }
        Ok(())
    }
}
