// ABOUTME: In-process SSH server for integration tests.
// ABOUTME: Fixed password account, accept-all publickey, SCP sink and SFTP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use russh::keys::{load_secret_key, ssh_key};
use russh::server::{Auth, Msg, Server, Session};
use russh::{Channel, ChannelId};
use russh_sftp::protocol::{
    FileAttributes, Handle as SftpHandle, OpenFlags, Status, StatusCode, Version,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TEST_USER: &str = "testuser";
pub const TEST_PASSWORD: &str = "testpassword";

/// Fault injection knobs for transfer tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Behavior {
    /// Close the SCP channel after this many complete files.
    pub scp_close_after_files: Option<usize>,
    /// Fail SFTP file opens after this many successful ones.
    pub sftp_fail_open_after: Option<usize>,
}

/// A running test server bound to an ephemeral port, serving files out
/// of a temporary directory.
pub struct TestServer {
    pub port: u16,
    root: tempfile::TempDir,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(Behavior::default()).await
    }

    pub async fn start_with(behavior: Behavior) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let host_key = load_secret_key(super::fixture("host_key"), None).expect("host key");

        let config = Arc::new(russh::server::Config {
            keys: vec![host_key],
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::ZERO),
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });

        let socket = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let addr: SocketAddr = socket.local_addr().expect("local addr");

        let mut runner = Runner {
            root: root.path().to_path_buf(),
            behavior,
            sftp_opens: Arc::new(AtomicUsize::new(0)),
        };
        let task = tokio::spawn(async move {
            let _ = runner.run_on_socket(config, &socket).await;
        });

        Self {
            port: addr.port(),
            root,
            task,
        }
    }

    /// Filesystem path a remote absolute path maps to.
    pub fn remote_path(&self, path: &str) -> PathBuf {
        self.root.path().join(path.trim_start_matches('/'))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Clone)]
struct Runner {
    root: PathBuf,
    behavior: Behavior,
    sftp_opens: Arc<AtomicUsize>,
}

impl Server for Runner {
    type Handler = TestHandler;

    fn new_client(&mut self, _peer_addr: Option<SocketAddr>) -> TestHandler {
        TestHandler {
            root: self.root.clone(),
            behavior: self.behavior,
            sftp_opens: Arc::clone(&self.sftp_opens),
            channels: HashMap::new(),
        }
    }
}

struct TestHandler {
    root: PathBuf,
    behavior: Behavior,
    sftp_opens: Arc<AtomicUsize>,
    channels: HashMap<ChannelId, Channel<Msg>>,
}

impl russh::server::Handler for TestHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if user == TEST_USER && password == TEST_PASSWORD {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
                partial_success: false,
            })
        }
    }

    async fn auth_publickey_offered(
        &mut self,
        _user: &str,
        _public_key: &ssh_key::PublicKey,
    ) -> Result<Auth, Self::Error> {
        Ok(Auth::Accept)
    }

    // Any key is accepted; only the auth method matters for these tests.
    async fn auth_publickey(
        &mut self,
        _user: &str,
        _public_key: &ssh_key::PublicKey,
    ) -> Result<Auth, Self::Error> {
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.channels.insert(channel.id(), channel);
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel_id: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).to_string();
        let Some(channel) = self.channels.remove(&channel_id) else {
            session.channel_failure(channel_id)?;
            return Ok(());
        };

        if command.starts_with("scp ") {
            let target = scp_target(&command, &self.root);
            let close_after = self.behavior.scp_close_after_files;
            session.channel_success(channel_id)?;
            tokio::spawn(async move {
                let _ = scp_sink(channel.into_stream(), target, close_after).await;
            });
        } else {
            session.channel_failure(channel_id)?;
        }
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel_id: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if name == "sftp" {
            if let Some(channel) = self.channels.remove(&channel_id) {
                session.channel_success(channel_id)?;
                let handler = SftpTestHandler {
                    root: self.root.clone(),
                    handles: HashMap::new(),
                    next_handle: 0,
                    opens: Arc::clone(&self.sftp_opens),
                    fail_open_after: self.behavior.sftp_fail_open_after,
                };
                tokio::spawn(async move {
                    russh_sftp::server::run(channel.into_stream(), handler).await;
                });
                return Ok(());
            }
        }
        session.channel_failure(channel_id)?;
        Ok(())
    }
}

/// Map the sink target named on the scp command line into the temp root.
fn scp_target(command: &str, root: &std::path::Path) -> PathBuf {
    let target = command.split_whitespace().last().unwrap_or(".");
    match target {
        "/" | "." => root.to_path_buf(),
        other => root.join(other.trim_start_matches('/')),
    }
}

/// Minimal scp sink: C/D/E records, ack bytes, trailing NUL after data.
async fn scp_sink<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    target: PathBuf,
    close_after: Option<usize>,
) -> std::io::Result<()> {
    stream.write_all(&[0]).await?;

    let mut dir_stack = vec![target];
    let mut files_received = 0usize;

    loop {
        let mut line = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            if stream.read(&mut byte).await? == 0 {
                return Ok(());
            }
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        let line = String::from_utf8_lossy(&line).to_string();
        let current = dir_stack.last().cloned().unwrap_or_default();

        match line.bytes().next() {
            Some(b'D') => {
                let name = match record_name(&line) {
                    Some(name) => name,
                    None => {
                        stream.write_all(b"\x02bad directory record\n").await?;
                        continue;
                    }
                };
                let dir = current.join(name);
                tokio::fs::create_dir_all(&dir).await?;
                dir_stack.push(dir);
                stream.write_all(&[0]).await?;
            }
            Some(b'E') => {
                if dir_stack.len() > 1 {
                    dir_stack.pop();
                }
                stream.write_all(&[0]).await?;
            }
            Some(b'C') => {
                let parts: Vec<&str> = line[1..].splitn(3, ' ').collect();
                let (size, name) = match (parts.get(1), parts.get(2)) {
                    (Some(size), Some(name)) => match size.parse::<u64>() {
                        Ok(size) => (size, name.trim().to_string()),
                        Err(_) => {
                            stream.write_all(b"\x02bad size\n").await?;
                            continue;
                        }
                    },
                    _ => {
                        stream.write_all(b"\x02bad file record\n").await?;
                        continue;
                    }
                };
                stream.write_all(&[0]).await?;

                let mut contents = vec![0u8; size as usize];
                stream.read_exact(&mut contents).await?;
                let mut nul = [0u8; 1];
                stream.read_exact(&mut nul).await?;

                tokio::fs::write(current.join(&name), &contents).await?;
                stream.write_all(&[0]).await?;

                files_received += 1;
                if close_after.is_some_and(|n| files_received >= n) {
                    // Drop the stream: the client observes the channel
                    // closing before its next record is acked.
                    return Ok(());
                }
            }
            _ => {
                stream.write_all(b"\x02unknown record\n").await?;
            }
        }
    }
}

/// Name field of a `C`/`D` record.
fn record_name(line: &str) -> Option<String> {
    line[1..].splitn(3, ' ').nth(2).map(|s| s.trim().to_string())
}

struct SftpTestHandler {
    root: PathBuf,
    handles: HashMap<String, tokio::fs::File>,
    next_handle: u64,
    opens: Arc<AtomicUsize>,
    fail_open_after: Option<usize>,
}

impl SftpTestHandler {
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn ok_status(id: u32) -> Status {
        Status {
            id,
            status_code: StatusCode::Ok,
            error_message: String::new(),
            language_tag: "en".to_string(),
        }
    }
}

impl russh_sftp::server::Handler for SftpTestHandler {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    async fn init(
        &mut self,
        _version: u32,
        _extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        Ok(Version::new())
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<SftpHandle, Self::Error> {
        if let Some(limit) = self.fail_open_after {
            if self.opens.fetch_add(1, Ordering::SeqCst) >= limit {
                return Err(StatusCode::ConnectionLost);
            }
        }

        let mut opts = tokio::fs::OpenOptions::new();
        if pflags.contains(OpenFlags::READ) {
            opts.read(true);
        }
        if pflags.contains(OpenFlags::WRITE) {
            opts.write(true);
        }
        if pflags.contains(OpenFlags::CREATE) {
            opts.create(true);
        }
        if pflags.contains(OpenFlags::TRUNCATE) {
            opts.truncate(true);
        }

        let file = opts
            .open(self.resolve(&filename))
            .await
            .map_err(|_| StatusCode::Failure)?;

        self.next_handle += 1;
        let handle = format!("h{}", self.next_handle);
        self.handles.insert(handle.clone(), file);
        Ok(SftpHandle { id, handle })
    }

    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        use tokio::io::{AsyncSeekExt, SeekFrom};

        let file = self.handles.get_mut(&handle).ok_or(StatusCode::Failure)?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|_| StatusCode::Failure)?;
        file.write_all(&data)
            .await
            .map_err(|_| StatusCode::Failure)?;
        Ok(Self::ok_status(id))
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        match self.handles.remove(&handle) {
            // Flush before acking: tokio files write in the background,
            // and tests read the file as soon as close returns.
            Some(mut file) => {
                file.flush().await.map_err(|_| StatusCode::Failure)?;
                Ok(Self::ok_status(id))
            }
            None => Err(StatusCode::Failure),
        }
    }

    async fn mkdir(
        &mut self,
        id: u32,
        path: String,
        _attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        match tokio::fs::create_dir(self.resolve(&path)).await {
            Ok(()) => Ok(Self::ok_status(id)),
            // Existing directories come back as Failure, like real servers.
            Err(_) => Err(StatusCode::Failure),
        }
    }
}
