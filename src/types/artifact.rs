// ABOUTME: Artifact entries and collections to be transferred.
// ABOUTME: Remote paths are relative, validated, and lexically ordered.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("remote path must not be empty")]
    EmptyRemotePath,

    #[error("remote path must be relative: {0}")]
    AbsoluteRemotePath(String),

    #[error("remote path must not contain '..': {0}")]
    ParentComponent(String),
}

/// One file to transfer: a local source and its path relative to the
/// remote base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub local_path: PathBuf,
    pub remote_path: String,
}

impl ArtifactEntry {
    pub fn new(
        local_path: impl Into<PathBuf>,
        remote_path: impl Into<String>,
    ) -> Result<Self, ArtifactError> {
        let remote_path = remote_path.into();
        if remote_path.trim().is_empty() {
            return Err(ArtifactError::EmptyRemotePath);
        }
        if remote_path.starts_with('/') {
            return Err(ArtifactError::AbsoluteRemotePath(remote_path));
        }
        if remote_path.split('/').any(|c| c == "..") {
            return Err(ArtifactError::ParentComponent(remote_path));
        }
        Ok(Self {
            local_path: local_path.into(),
            remote_path,
        })
    }

    /// Directory prefix of the remote path, innermost last.
    /// `a/b/c.txt` yields `["a", "a/b"]`.
    pub fn remote_dir_prefixes(&self) -> Vec<String> {
        let mut prefixes = Vec::new();
        let mut acc = String::new();
        let components: Vec<&str> = self.remote_path.split('/').collect();
        for component in &components[..components.len().saturating_sub(1)] {
            if !acc.is_empty() {
                acc.push('/');
            }
            acc.push_str(component);
            prefixes.push(acc.clone());
        }
        prefixes
    }

    /// Final path component (the remote file name).
    pub fn remote_file_name(&self) -> &str {
        self.remote_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.remote_path)
    }
}

/// A named, ordered set of artifact entries transferred as a unit.
#[derive(Debug, Clone)]
pub struct ArtifactCollection {
    pub name: String,
    entries: Vec<ArtifactEntry>,
}

impl ArtifactCollection {
    /// Build a collection with the default deterministic order:
    /// lexical by remote path.
    pub fn new(name: impl Into<String>, mut entries: Vec<ArtifactEntry>) -> Self {
        entries.sort_by(|a, b| a.remote_path.cmp(&b.remote_path));
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Build a collection that keeps the caller-declared order.
    pub fn with_declared_order(name: impl Into<String>, entries: Vec<ArtifactEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn entries(&self) -> &[ArtifactEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
