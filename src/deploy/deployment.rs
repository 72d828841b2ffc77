// ABOUTME: Generic deployment struct parameterized by state.
// ABOUTME: Holds the target and timing shared across all states.

use crate::config::Config;
use crate::ssh::SessionConfig;

use super::state::Idle;

/// A deployment in progress, parameterized by its current state.
///
/// The state type parameter `S` carries state-specific data (the resolved
/// credential, the open session) directly in the state type, so a transfer
/// cannot be attempted without an authenticated session existing first.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) session_config: SessionConfig,
    pub(crate) remote_dir: String,
    pub(crate) state: S,
}

impl Deployment<Idle> {
    pub fn new(config: &Config) -> Self {
        let session_config = SessionConfig::new(&config.target.host)
            .port(config.target.port)
            .connect_timeout(config.connect_timeout)
            .auth_timeout(config.connect_timeout);

        Deployment {
            session_config,
            remote_dir: config.target.remote_dir.clone(),
            state: Idle,
        }
    }
}

impl<S> Deployment<S> {
    pub fn host(&self) -> &str {
        &self.session_config.host
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }
}
