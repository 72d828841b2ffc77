// ABOUTME: Transfer strategies: push artifact collections over SCP or SFTP.
// ABOUTME: One upload contract, per-file outcomes, fail-fast session loss.

mod error;
mod scp;
mod sftp;

pub use error::{SessionLost, TransferError};
pub use scp::ScpPush;
pub use sftp::SftpPush;

use crate::config::Protocol;
use crate::ssh::Session;
use crate::types::ArtifactCollection;
use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Outcome of one artifact entry.
#[derive(Debug, Serialize)]
pub struct FileResult {
    pub collection: String,
    pub remote_path: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<TransferError>,
}

impl FileResult {
    pub fn ok(collection: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            remote_path: remote_path.into(),
            error: None,
        }
    }

    pub fn failed(
        collection: impl Into<String>,
        remote_path: impl Into<String>,
        error: TransferError,
    ) -> Self {
        Self {
            collection: collection.into(),
            remote_path: remote_path.into(),
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<TransferError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Copy artifact collections into a remote base directory, creating missing
/// subdirectories.
///
/// Entries are processed in the order their collections declare. Per-file
/// failures are recorded without aborting siblings; loss of the underlying
/// session fails fast with [`SessionLost`], carrying the partial results.
#[async_trait]
pub trait TransferStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn upload(
        &self,
        session: &Session,
        collections: &[ArtifactCollection],
        remote_dir: &str,
    ) -> Result<Vec<FileResult>, SessionLost>;
}

/// Select the strategy for the configured subprotocol.
pub fn strategy_for(
    protocol: Protocol,
    io_timeout: Duration,
    fail_fast: bool,
) -> Box<dyn TransferStrategy> {
    match protocol {
        Protocol::Sftp => Box::new(SftpPush::new(io_timeout, fail_fast)),
        Protocol::Scp => Box::new(ScpPush::new(io_timeout, fail_fast)),
    }
}

/// Join a relative artifact path onto the remote base directory.
pub(crate) fn join_remote(base: &str, rel: &str) -> String {
    if base.is_empty() || base == "." {
        rel.to_string()
    } else if base.ends_with('/') {
        format!("{base}{rel}")
    } else {
        format!("{base}/{rel}")
    }
}
