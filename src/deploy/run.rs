// ABOUTME: End-to-end deployment driver over the state machine.
// ABOUTME: Every failure is folded into a report; nothing escapes as Err.

use crate::config::Config;
use crate::credential::KeyStore;
use crate::transfer::strategy_for;

use super::Deployment;
use super::error::DeployError;
use super::report::DeployReport;

/// Run one deployment from configuration to report.
///
/// Walks Idle -> CredentialResolved -> SessionOpen -> transfer. A failure
/// before the transfer phase produces a report with an empty file list;
/// from the transfer phase on, the report covers every configured entry.
pub async fn run(config: &Config, keys: &dyn KeyStore) -> DeployReport {
    let collections = match config.collections() {
        Ok(collections) => collections,
        Err(e) => {
            return DeployReport::failed(&DeployError::Configuration(e.to_string()), Vec::new());
        }
    };

    tracing::info!(
        host = %config.target.host,
        port = config.target.port,
        remote_dir = %config.target.remote_dir,
        "deployment starting"
    );

    let resolved = match Deployment::new(config).resolve_credential(&config.auth, keys) {
        Ok(deployment) => deployment,
        Err(e) => {
            tracing::error!(error = %e, "credential resolution failed");
            return DeployReport::failed(&e, Vec::new());
        }
    };

    let open = match resolved.open_session().await {
        Ok(deployment) => deployment,
        Err(e) => {
            tracing::error!(error = %e, "session establishment failed");
            return DeployReport::failed(&e, Vec::new());
        }
    };

    let strategy = strategy_for(
        config.transfer.protocol,
        config.io_timeout,
        config.transfer.fail_fast,
    );
    let report = open.transfer(strategy.as_ref(), &collections).await;

    if report.success() {
        tracing::info!(files = report.transferred(), "deployment completed");
    } else {
        tracing::error!(
            transferred = report.transferred(),
            failed = report.failed_files(),
            "deployment failed"
        );
    }
    report
}
