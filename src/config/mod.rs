// ABOUTME: Configuration types and parsing for skiff.yml.
// ABOUTME: Handles YAML parsing, defaults, and destination merging.

mod auth;

pub use auth::{AuthConfig, AuthConfigError};

use crate::error::{Error, Result};
use crate::types::{ArtifactCollection, ArtifactEntry, DeploymentTarget};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "skiff.yml";
pub const CONFIG_FILENAME_ALT: &str = "skiff.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: DeploymentTarget,

    pub auth: AuthConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    /// Bound on TCP connect plus SSH handshake.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Bound on each file read/write during transfer.
    #[serde(default = "default_io_timeout", with = "humantime_serde")]
    pub io_timeout: Duration,

    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,

    /// Directory holding managed keys, one PEM file per key id.
    #[serde(default)]
    pub keys_dir: Option<PathBuf>,

    #[serde(default)]
    pub destinations: HashMap<String, Destination>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Destination {
    #[serde(default)]
    pub target: Option<DeploymentTarget>,

    #[serde(default)]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub transfer: Option<TransferConfig>,

    #[serde(default)]
    pub artifacts: Option<Vec<ArtifactSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    #[serde(default)]
    pub protocol: Protocol,

    /// Stop submitting further entries after the first per-file error.
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            fail_fast: false,
        }
    }
}

/// Transfer subprotocol carried over the SSH session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Sftp,
    Scp,
}

/// One artifact line from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactSpec {
    pub local: PathBuf,
    pub remote: String,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_io_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn validate(&self) -> Result<()> {
        self.target
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        self.auth
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let mut seen = HashSet::new();
        for spec in &self.artifacts {
            ArtifactEntry::new(&spec.local, &spec.remote)
                .map_err(|e| Error::InvalidConfig(e.to_string()))?;
            if !seen.insert(spec.remote.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate remote path: {}",
                    spec.remote
                )));
            }
        }
        Ok(())
    }

    /// Merge a named destination's overrides over the base config.
    pub fn for_destination(&self, name: &str) -> Result<Config> {
        let dest = self
            .destinations
            .get(name)
            .ok_or_else(|| Error::UnknownDestination(name.to_string()))?;

        let mut merged = self.clone();

        if let Some(ref target) = dest.target {
            merged.target = target.clone();
        }
        if let Some(ref auth) = dest.auth {
            merged.auth = auth.clone();
        }
        if let Some(ref transfer) = dest.transfer {
            merged.transfer = transfer.clone();
        }
        if let Some(ref artifacts) = dest.artifacts {
            merged.artifacts = artifacts.clone();
        }

        merged.validate()?;
        Ok(merged)
    }

    /// Turn the configured artifact list into one lexically ordered
    /// collection.
    pub fn collections(&self) -> Result<Vec<ArtifactCollection>> {
        let entries = self
            .artifacts
            .iter()
            .map(|spec| {
                ArtifactEntry::new(&spec.local, &spec.remote)
                    .map_err(|e| Error::InvalidConfig(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(vec![ArtifactCollection::new("artifacts", entries)])
    }
}

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, template_yaml())?;
    Ok(())
}

fn template_yaml() -> &'static str {
    r#"target:
  host: deploy.example.com
  port: 22
  remote_dir: /srv/app
auth:
  method: password
  username: deploy
  password: change-me
transfer:
  protocol: sftp
artifacts:
  - local: build/app.tar.gz
    remote: releases/app.tar.gz
"#
}
