// ABOUTME: Deployment reports: one outcome plus per-file results.
// ABOUTME: Produced on every exit path, success or failure.

use super::error::{DeployError, DeployErrorKind};
use crate::transfer::FileResult;
use serde::Serialize;

/// What happened to the deployment as a whole.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DeployOutcome {
    Completed,
    Failed {
        kind: DeployErrorKind,
        message: String,
    },
}

/// The complete record of one deployment.
///
/// `files` covers every configured artifact entry: transferred, failed, or
/// skipped. A deployment that never reached the transfer phase carries an
/// empty list.
#[derive(Debug, Serialize)]
pub struct DeployReport {
    pub outcome: DeployOutcome,
    pub files: Vec<FileResult>,
}

impl DeployReport {
    pub fn completed(files: Vec<FileResult>) -> Self {
        Self {
            outcome: DeployOutcome::Completed,
            files,
        }
    }

    pub fn failed(error: &DeployError, files: Vec<FileResult>) -> Self {
        Self {
            outcome: DeployOutcome::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
            files,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, DeployOutcome::Completed)
    }

    pub fn transferred(&self) -> usize {
        self.files.iter().filter(|f| f.success()).count()
    }

    pub fn failed_files(&self) -> usize {
        self.files.len() - self.transferred()
    }
}
