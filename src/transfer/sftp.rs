// ABOUTME: SFTP push strategy over the sftp subsystem channel.
// ABOUTME: Explicit mkdir tolerating "already exists"; overwriting writes.

use super::error::{SessionLost, TransferError};
use super::{FileResult, TransferStrategy, join_remote};
use crate::ssh::Session;
use crate::types::{ArtifactCollection, ArtifactEntry};
use async_trait::async_trait;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{OpenFlags, Status, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Push artifacts through the SFTP subsystem.
///
/// One subsystem channel per invocation. Each distinct directory prefix
/// gets an explicit create-directory request; "already exists" is
/// non-fatal. Files are opened CREATE|TRUNCATE|WRITE, overwriting any
/// previous content.
pub struct SftpPush {
    io_timeout: Duration,
    fail_fast: bool,
}

/// How a single SFTP failure affects the invocation.
enum EntryFailure {
    File(TransferError),
    Fatal(String),
}

impl SftpPush {
    pub fn new(io_timeout: Duration, fail_fast: bool) -> Self {
        Self {
            io_timeout,
            fail_fast,
        }
    }

    async fn upload_entry(
        &self,
        sftp: &SftpSession,
        entry: &ArtifactEntry,
        remote_dir: &str,
        created: &mut HashSet<String>,
    ) -> Result<(), EntryFailure> {
        for prefix in entry.remote_dir_prefixes() {
            let dir = join_remote(remote_dir, &prefix);
            ensure_dir(sftp, &dir, created).await?;
        }

        let bytes = tokio::fs::read(&entry.local_path)
            .await
            .map_err(|e| {
                EntryFailure::File(TransferError::LocalRead {
                    path: entry.local_path.display().to_string(),
                    reason: e.to_string(),
                })
            })?;

        let remote_path = join_remote(remote_dir, &entry.remote_path);
        let mut file = sftp
            .open_with_flags(
                &remote_path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| classify_sftp(&remote_path, "open", e))?;

        file.write_all(&bytes)
            .await
            .map_err(|e| classify_io(&remote_path, e))?;
        file.shutdown()
            .await
            .map_err(|e| classify_io(&remote_path, e))?;

        tracing::debug!(path = %remote_path, bytes = bytes.len(), "uploaded via sftp");
        Ok(())
    }
}

#[async_trait]
impl TransferStrategy for SftpPush {
    fn name(&self) -> &'static str {
        "sftp"
    }

    async fn upload(
        &self,
        session: &Session,
        collections: &[ArtifactCollection],
        remote_dir: &str,
    ) -> Result<Vec<FileResult>, SessionLost> {
        let channel = session
            .open_channel()
            .await
            .map_err(|e| SessionLost::new(e.to_string(), Vec::new()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| SessionLost::new(format!("sftp subsystem refused: {e}"), Vec::new()))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SessionLost::new(format!("sftp init failed: {e}"), Vec::new()))?;

        let mut results = Vec::new();
        let mut created = HashSet::new();

        // The base directory itself is created on demand.
        if let Err(failure) = ensure_base_dir(&sftp, remote_dir, &mut created).await {
            match failure {
                EntryFailure::Fatal(reason) => return Err(SessionLost::new(reason, results)),
                EntryFailure::File(e) => {
                    tracing::debug!(dir = %remote_dir, error = %e, "base directory create skipped");
                }
            }
        }

        'collections: for collection in collections {
            for entry in collection.entries() {
                let attempt = tokio::time::timeout(
                    self.io_timeout,
                    self.upload_entry(&sftp, entry, remote_dir, &mut created),
                )
                .await;

                match attempt {
                    Ok(Ok(())) => {
                        results.push(FileResult::ok(&collection.name, &entry.remote_path));
                    }
                    Ok(Err(EntryFailure::File(error))) => {
                        tracing::warn!(path = %entry.remote_path, error = %error, "entry failed");
                        results.push(FileResult::failed(
                            &collection.name,
                            &entry.remote_path,
                            error,
                        ));
                        if self.fail_fast {
                            break 'collections;
                        }
                    }
                    Ok(Err(EntryFailure::Fatal(reason))) => {
                        return Err(SessionLost::new(reason, results));
                    }
                    Err(_) => {
                        results.push(FileResult::failed(
                            &collection.name,
                            &entry.remote_path,
                            TransferError::Timeout {
                                path: entry.remote_path.clone(),
                            },
                        ));
                        if self.fail_fast {
                            break 'collections;
                        }
                    }
                }
            }
        }

        Ok(results)
    }
}

/// Create one directory, remembering successes and tolerating "exists".
async fn ensure_dir(
    sftp: &SftpSession,
    dir: &str,
    created: &mut HashSet<String>,
) -> Result<(), EntryFailure> {
    if created.contains(dir) {
        return Ok(());
    }
    match sftp.create_dir(dir).await {
        Ok(()) => {
            created.insert(dir.to_string());
            Ok(())
        }
        // Servers report an existing directory as Failure; re-running a
        // deployment must not trip over it.
        Err(russh_sftp::client::error::Error::Status(Status {
            status_code: StatusCode::Failure,
            ..
        })) => {
            created.insert(dir.to_string());
            Ok(())
        }
        Err(e) => Err(classify_sftp(dir, "mkdir", e)),
    }
}

/// Create every component of the remote base directory.
async fn ensure_base_dir(
    sftp: &SftpSession,
    remote_dir: &str,
    created: &mut HashSet<String>,
) -> Result<(), EntryFailure> {
    let absolute = remote_dir.starts_with('/');
    let mut acc = String::new();
    for component in remote_dir.split('/').filter(|c| !c.is_empty() && *c != ".") {
        if acc.is_empty() && absolute {
            acc.push('/');
        } else if !acc.is_empty() && !acc.ends_with('/') {
            acc.push('/');
        }
        acc.push_str(component);
        ensure_dir(sftp, &acc, created).await?;
    }
    Ok(())
}

/// Split SFTP status errors (per-file) from transport loss (fatal).
fn classify_sftp(path: &str, op: &str, err: russh_sftp::client::error::Error) -> EntryFailure {
    use russh_sftp::client::error::Error;
    match err {
        Error::Status(Status {
            status_code: StatusCode::ConnectionLost,
            ..
        })
        | Error::Status(Status {
            status_code: StatusCode::NoConnection,
            ..
        }) => EntryFailure::Fatal(format!("sftp connection lost during {op} of {path}")),
        Error::Status(Status {
            status_code: code, ..
        }) => EntryFailure::File(match op {
            "mkdir" => TransferError::CreateDir {
                path: path.to_string(),
                reason: format!("{code:?}"),
            },
            _ => TransferError::Write {
                path: path.to_string(),
                reason: format!("{code:?}"),
            },
        }),
        other => EntryFailure::Fatal(format!("sftp transport failed during {op}: {other}")),
    }
}

/// Classify raw I/O errors from the remote file handle.
fn classify_io(path: &str, err: std::io::Error) -> EntryFailure {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => {
            EntryFailure::Fatal(format!("sftp channel lost while writing {path}: {err}"))
        }
        _ => EntryFailure::File(TransferError::Write {
            path: path.to_string(),
            reason: err.to_string(),
        }),
    }
}
