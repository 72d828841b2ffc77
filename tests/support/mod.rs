// ABOUTME: Test support utilities.
// ABOUTME: Provides an in-process SSH server and config builders.

use std::path::{Path, PathBuf};
use std::sync::Once;

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod server;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("skiff=debug".parse().unwrap())
            .add_directive("russh=info".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Path to a key fixture checked into the repository.
#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Build a deployment config against a local test server.
#[allow(dead_code)]
pub fn config_for(
    port: u16,
    auth_yaml: &str,
    protocol: &str,
    artifacts: &[(&Path, &str)],
) -> skiff::config::Config {
    let mut yaml = format!(
        "target:\n  host: 127.0.0.1\n  port: {port}\n  remote_dir: /upload\n\
         auth:\n{auth_yaml}\
         transfer:\n  protocol: {protocol}\n\
         connect_timeout: 5s\nio_timeout: 10s\nartifacts:\n"
    );
    for (local, remote) in artifacts {
        yaml.push_str(&format!(
            "  - local: \"{}\"\n    remote: \"{}\"\n",
            local.display(),
            remote
        ));
    }
    skiff::config::Config::from_yaml(&yaml).expect("test config should parse")
}

/// Auth block for the fixed test account.
#[allow(dead_code)]
pub fn password_auth() -> String {
    format!(
        "  method: password\n  username: {}\n  password: {}\n",
        server::TEST_USER,
        server::TEST_PASSWORD
    )
}

#[allow(dead_code)]
pub fn key_auth(key_file: &Path, passphrase: Option<&str>) -> String {
    let mut block = format!(
        "  method: private-key\n  username: {}\n  key_file: \"{}\"\n",
        server::TEST_USER,
        key_file.display()
    );
    if let Some(passphrase) = passphrase {
        block.push_str(&format!("  passphrase: {passphrase}\n"));
    }
    block
}
