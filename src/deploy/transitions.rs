// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self; the session closes on every exit path.

use std::collections::HashMap;

use crate::config::AuthConfig;
use crate::credential::{self, KeyStore};
use crate::ssh::Session;
use crate::transfer::{FileResult, TransferError, TransferStrategy};
use crate::types::ArtifactCollection;

use super::Deployment;
use super::error::DeployError;
use super::report::DeployReport;
use super::state::{CredentialResolved, Idle, SessionOpen};

// =============================================================================
// Idle -> CredentialResolved
// =============================================================================

impl Deployment<Idle> {
    /// Materialize the declared auth method into a concrete credential.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Configuration` for missing fields, unreadable
    /// key files, or an unknown managed key id.
    #[must_use = "deployment state must be used"]
    pub fn resolve_credential(
        self,
        auth: &AuthConfig,
        keys: &dyn KeyStore,
    ) -> Result<Deployment<CredentialResolved>, DeployError> {
        let credential = credential::resolve(auth, keys)?;
        tracing::debug!(
            user = %credential.username(),
            method = credential.method_name(),
            "credential resolved"
        );
        Ok(Deployment {
            session_config: self.session_config,
            remote_dir: self.remote_dir,
            state: CredentialResolved { credential },
        })
    }
}

// =============================================================================
// CredentialResolved -> SessionOpen
// =============================================================================

impl Deployment<CredentialResolved> {
    /// Connect and authenticate within the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Connect` when the target is unreachable and
    /// `DeployError::Authentication` when the credential is rejected.
    #[must_use = "deployment state must be used"]
    pub async fn open_session(self) -> Result<Deployment<SessionOpen>, DeployError> {
        let session = Session::establish(&self.session_config, &self.state.credential).await?;
        Ok(Deployment {
            session_config: self.session_config,
            remote_dir: self.remote_dir,
            state: SessionOpen { session },
        })
    }
}

// =============================================================================
// SessionOpen -> terminal report
// =============================================================================

impl Deployment<SessionOpen> {
    /// Run the transfer and close the session.
    ///
    /// Terminal transition: whatever the strategy does, the session is
    /// disconnected before the report is returned, and the report covers
    /// every configured entry.
    pub async fn transfer(
        self,
        strategy: &dyn TransferStrategy,
        collections: &[ArtifactCollection],
    ) -> DeployReport {
        let total: usize = collections.iter().map(|c| c.len()).sum();
        tracing::info!(
            host = %self.session_config.host,
            protocol = strategy.name(),
            files = total,
            "starting transfer"
        );

        let outcome = strategy
            .upload(&self.state.session, collections, &self.remote_dir)
            .await;

        if let Err(e) = self.state.session.disconnect().await {
            tracing::warn!(error = %e, "disconnect after transfer failed");
        }

        match outcome {
            Ok(results) => {
                let files = cover_all_entries(
                    collections,
                    results,
                    "aborted after earlier failure",
                );
                let failed = files.iter().filter(|f| !f.success()).count();
                if failed == 0 {
                    DeployReport::completed(files)
                } else {
                    let error = DeployError::Transfer(format!(
                        "{failed} of {total} files failed to transfer"
                    ));
                    DeployReport::failed(&error, files)
                }
            }
            Err(lost) => {
                let files =
                    cover_all_entries(collections, lost.partial, "session lost before transfer");
                let error = DeployError::SessionLost(lost.reason);
                DeployReport::failed(&error, files)
            }
        }
    }
}

/// Expand strategy results to one entry per configured artifact, in
/// declared order, marking unattempted entries as skipped.
fn cover_all_entries(
    collections: &[ArtifactCollection],
    results: Vec<FileResult>,
    skip_reason: &str,
) -> Vec<FileResult> {
    let mut recorded: HashMap<(String, String), FileResult> = results
        .into_iter()
        .map(|r| ((r.collection.clone(), r.remote_path.clone()), r))
        .collect();

    let mut files = Vec::new();
    for collection in collections {
        for entry in collection.entries() {
            let key = (collection.name.clone(), entry.remote_path.clone());
            match recorded.remove(&key) {
                Some(result) => files.push(result),
                None => files.push(FileResult::failed(
                    &collection.name,
                    &entry.remote_path,
                    TransferError::Skipped(skip_reason.to_string()),
                )),
            }
        }
    }
    files
}
