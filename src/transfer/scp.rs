// ABOUTME: SCP push strategy over an exec channel running a remote sink.
// ABOUTME: Dir-stack walking with D/E records; ack-driven file records.

use super::error::{SessionLost, TransferError};
use super::{FileResult, TransferStrategy};
use crate::ssh::Session;
use crate::types::{ArtifactCollection, ArtifactEntry};
use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::time::Duration;

/// Push artifacts through a remote `scp -t` sink.
///
/// The sink is invoked once with `-r -d` rooted at `/` (or the remote
/// home for a relative base); the base directory and nested destinations
/// are all reached by walking a directory stack with `D`/`E` records, so
/// missing directories are created along the way rather than assumed.
/// Every record waits for the sink's ack byte: 0 continues, 1 or 2 carry
/// an error line.
pub struct ScpPush {
    io_timeout: Duration,
    fail_fast: bool,
}

/// A non-zero ack or a channel that stopped answering.
enum AckFailure {
    /// The sink refused the record; the channel is no longer in a usable
    /// protocol state and must be reopened.
    Rejected(String),
    /// The channel closed underneath us.
    Lost(String),
}

impl ScpPush {
    pub fn new(io_timeout: Duration, fail_fast: bool) -> Self {
        Self {
            io_timeout,
            fail_fast,
        }
    }
}

#[async_trait]
impl TransferStrategy for ScpPush {
    fn name(&self) -> &'static str {
        "scp"
    }

    async fn upload(
        &self,
        session: &Session,
        collections: &[ArtifactCollection],
        remote_dir: &str,
    ) -> Result<Vec<FileResult>, SessionLost> {
        let mut results = Vec::new();
        let mut sink: Option<ScpSink> = None;

        'collections: for collection in collections {
            for entry in collection.entries() {
                // A rejected record or a timeout leaves the previous sink
                // in an unknown state; each entry starts from a live one.
                if sink.is_none() {
                    match ScpSink::open(session, remote_dir).await {
                        Ok(s) => sink = Some(s),
                        Err(reason) => return Err(SessionLost::new(reason, results)),
                    }
                }
                let active = match sink.as_mut() {
                    Some(s) => s,
                    None => return Err(SessionLost::new("scp sink unavailable", results)),
                };

                let attempt =
                    tokio::time::timeout(self.io_timeout, active.send_entry(entry)).await;

                match attempt {
                    Ok(Ok(())) => {
                        tracing::debug!(path = %entry.remote_path, "uploaded via scp");
                        results.push(FileResult::ok(&collection.name, &entry.remote_path));
                    }
                    Ok(Err(EntrySendError::File(error))) => {
                        tracing::warn!(path = %entry.remote_path, error = %error, "entry failed");
                        results.push(FileResult::failed(
                            &collection.name,
                            &entry.remote_path,
                            error,
                        ));
                        sink = None;
                        if self.fail_fast {
                            break 'collections;
                        }
                    }
                    Ok(Err(EntrySendError::Lost(reason))) => {
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
                        sink = None;
                        if self.fail_fast {
                            break 'collections;
                        }
                    }
                }
            }
        }

        if let Some(active) = sink {
            active.finish().await;
        }
        Ok(results)
    }
}

/// Failure of one entry against the sink.
enum EntrySendError {
    File(TransferError),
    Lost(String),
}

/// One exec channel running the remote sink, plus the directory stack
/// the sink currently has open.
struct ScpSink {
    channel: Channel<Msg>,
    /// Components of the remote base directory; pushed before any entry
    /// and never popped until the sink winds down.
    base: Vec<String>,
    dir_stack: Vec<String>,
    pending: Vec<u8>,
}

impl ScpSink {
    /// Start `scp -t -r -d` on a fresh channel and consume the ready ack.
    async fn open(session: &Session, remote_dir: &str) -> Result<Self, String> {
        let channel = session
            .open_channel()
            .await
            .map_err(|e| format!("failed to open scp channel: {e}"))?;

        let root = if remote_dir.starts_with('/') { "/" } else { "." };
        let command = format!("scp -t -r -d {root}");
        channel
            .exec(true, command.as_str())
            .await
            .map_err(|e| format!("failed to start scp sink: {e}"))?;

        let base = remote_dir
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(str::to_string)
            .collect();

        let mut sink = Self {
            channel,
            base,
            dir_stack: Vec::new(),
            pending: Vec::new(),
        };
        match sink.read_ack().await {
            Ok(()) => Ok(sink),
            Err(AckFailure::Rejected(msg)) => Err(format!("scp sink refused to start: {msg}")),
            Err(AckFailure::Lost(msg)) => Err(msg),
        }
    }

    /// Send one file, walking the directory stack to its parent first.
    async fn send_entry(&mut self, entry: &ArtifactEntry) -> Result<(), EntrySendError> {
        let bytes = tokio::fs::read(&entry.local_path).await.map_err(|e| {
            EntrySendError::File(TransferError::LocalRead {
                path: entry.local_path.display().to_string(),
                reason: e.to_string(),
            })
        })?;

        let mut target = self.base.clone();
        target.extend(dir_components(&entry.remote_path));
        let (pops, pushes) = dir_delta(&self.dir_stack, &target);

        for _ in 0..pops {
            self.send_record(b"E\n").await.map_err(|f| {
                self.classify(f, &entry.remote_path, |p, reason| TransferError::CreateDir {
                    path: p,
                    reason,
                })
            })?;
            self.dir_stack.pop();
        }
        for dir in pushes {
            let record = dir_header(&dir);
            self.send_record(record.as_bytes()).await.map_err(|f| {
                self.classify(f, &dir, |p, reason| TransferError::CreateDir {
                    path: p,
                    reason,
                })
            })?;
            self.dir_stack.push(dir);
        }

        let name = entry.remote_file_name();
        let header = file_header(name, bytes.len() as u64);
        self.send_record(header.as_bytes()).await.map_err(|f| {
            self.classify(f, &entry.remote_path, |p, reason| TransferError::Rejected {
                path: p,
                reason,
            })
        })?;

        self.channel
            .data(&bytes[..])
            .await
            .map_err(|e| EntrySendError::Lost(format!("scp channel write failed: {e}")))?;
        // Trailing NUL terminates the file body.
        self.channel
            .data(&[0u8][..])
            .await
            .map_err(|e| EntrySendError::Lost(format!("scp channel write failed: {e}")))?;

        match self.read_ack().await {
            Ok(()) => Ok(()),
            Err(AckFailure::Rejected(msg)) => {
                Err(EntrySendError::File(TransferError::Rejected {
                    path: entry.remote_path.clone(),
                    reason: msg,
                }))
            }
            Err(AckFailure::Lost(msg)) => Err(EntrySendError::Lost(msg)),
        }
    }

    /// Write one protocol record and consume its ack.
    async fn send_record(&mut self, record: &[u8]) -> Result<(), AckFailure> {
        self.channel
            .data(record)
            .await
            .map_err(|e| AckFailure::Lost(format!("scp channel write failed: {e}")))?;
        self.read_ack().await
    }

    fn classify(
        &self,
        failure: AckFailure,
        path: &str,
        per_file: impl FnOnce(String, String) -> TransferError,
    ) -> EntrySendError {
        match failure {
            AckFailure::Rejected(msg) => EntrySendError::File(per_file(path.to_string(), msg)),
            AckFailure::Lost(msg) => EntrySendError::Lost(msg),
        }
    }

    /// Read the sink's ack byte. 1 and 2 are followed by a message line.
    async fn read_ack(&mut self) -> Result<(), AckFailure> {
        let code = self.next_byte().await?;
        match code {
            0 => Ok(()),
            1 | 2 => {
                let mut message = Vec::new();
                loop {
                    let byte = self.next_byte().await?;
                    if byte == b'\n' {
                        break;
                    }
                    message.push(byte);
                }
                Err(AckFailure::Rejected(
                    String::from_utf8_lossy(&message).trim().to_string(),
                ))
            }
            other => Err(AckFailure::Rejected(format!(
                "unexpected scp response byte {other:#04x}"
            ))),
        }
    }

    async fn next_byte(&mut self) -> Result<u8, AckFailure> {
        loop {
            if !self.pending.is_empty() {
                return Ok(self.pending.remove(0));
            }
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    self.pending.extend_from_slice(&data);
                }
                // The sink's stderr is not part of the ack protocol.
                Some(ChannelMsg::ExtendedData { .. })
                | Some(ChannelMsg::ExitStatus { .. })
                | Some(ChannelMsg::Success) => {}
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) => {
                    return Err(AckFailure::Lost(
                        "scp channel closed while awaiting ack".to_string(),
                    ));
                }
                None => {
                    return Err(AckFailure::Lost(
                        "session dropped while awaiting scp ack".to_string(),
                    ));
                }
                Some(_) => {}
            }
        }
    }

    /// Unwind the directory stack and end the sink conversation.
    async fn finish(mut self) {
        for _ in 0..self.dir_stack.len() {
            if self.send_record(b"E\n").await.is_err() {
                break;
            }
        }
        let _ = self.channel.eof().await;
    }
}

fn file_header(name: &str, size: u64) -> String {
    format!("C0644 {size} {name}\n")
}

fn dir_header(name: &str) -> String {
    format!("D0755 0 {name}\n")
}

/// Directory components of an artifact's relative remote path.
fn dir_components(remote_path: &str) -> Vec<String> {
    let mut parts: Vec<String> = remote_path.split('/').map(str::to_string).collect();
    parts.pop();
    parts
}

/// How to get from the currently open stack to the target: number of
/// `E` pops, then the names to push with `D` records.
fn dir_delta(current: &[String], target: &[String]) -> (usize, Vec<String>) {
    let common = current
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    (current.len() - common, target[common..].to_vec())
}
