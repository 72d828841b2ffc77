// ABOUTME: Transfer-specific error types.
// ABOUTME: Per-file failures are distinct from fatal session loss.

use thiserror::Error;

/// Failure of a single artifact entry. Recorded per file; never aborts
/// sibling transfers.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to read local file {path}: {reason}")]
    LocalRead { path: String, reason: String },

    #[error("failed to create remote directory {path}: {reason}")]
    CreateDir { path: String, reason: String },

    #[error("failed to write remote file {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("remote rejected {path}: {reason}")]
    Rejected { path: String, reason: String },

    #[error("transfer of {path} timed out")]
    Timeout { path: String },

    #[error("skipped: {0}")]
    Skipped(String),
}

/// The session or its channel became unusable mid-operation. Aborts all
/// remaining transfers in the invocation; carries the per-file results
/// gathered before the loss.
#[derive(Debug, Error)]
#[error("session lost: {reason}")]
pub struct SessionLost {
    pub reason: String,
    pub partial: Vec<super::FileResult>,
}

impl SessionLost {
    pub fn new(reason: impl Into<String>, partial: Vec<super::FileResult>) -> Self {
        Self {
            reason: reason.into(),
            partial,
        }
    }
}
