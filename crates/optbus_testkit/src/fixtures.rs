//! Test fixtures and server helpers.
//!
//! Provides a sync server on an ephemeral port with provisioned
//! credentials, plus helpers for ini files on disk.

use optbus_core::Registry;
use optbus_server::{provision_client, provision_user, ServerConfig, ServerHandle, SyncServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Client name enabled on every [`TestServer`].
pub const TEST_CLIENT: &str = "testkit";
/// User provisioned on every [`TestServer`].
pub const TEST_USER: &str = "admin";
/// Password of [`TEST_USER`].
pub const TEST_PASSWORD: &str = "secret";

/// A running sync server with automatic shutdown.
pub struct TestServer {
    /// The registry the server exposes.
    pub registry: Arc<Registry>,
    handle: Option<ServerHandle>,
}

impl TestServer {
    /// Starts a server with default settings.
    pub fn start() -> Self {
        Self::start_with(|config| config)
    }

    /// Starts a server after letting `configure` adjust the config.
    ///
    /// The port is always forced to an ephemeral one.
    pub fn start_with(configure: impl FnOnce(ServerConfig) -> ServerConfig) -> Self {
        let registry = Arc::new(Registry::new());
        provision_client(&registry, TEST_CLIENT).expect("Failed to provision client");
        provision_user(&registry, TEST_USER, TEST_PASSWORD).expect("Failed to provision user");

        let config = configure(
            ServerConfig::default().with_io_timeout(Duration::from_secs(2)),
        )
        .with_port(0);
        let handle = SyncServer::new(Arc::clone(&registry), config)
            .start()
            .expect("Failed to start sync server");

        Self {
            registry,
            handle: Some(handle),
        }
    }

    /// Address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.handle().local_addr()
    }

    /// Port the server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Number of connection records on the server.
    pub fn connection_count(&self) -> usize {
        self.handle().connection_count()
    }

    /// Stops the server now.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
        }
    }

    fn handle(&self) -> &ServerHandle {
        self.handle.as_ref().expect("Server already stopped")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs a test against a fresh server.
///
/// # Example
///
/// ```rust,ignore
/// use optbus_testkit::with_test_server;
///
/// #[test]
/// fn my_test() {
///     with_test_server(|server| {
///         server.registry.register_default("s:/x").unwrap();
///     });
/// }
/// ```
pub fn with_test_server<F, R>(f: F) -> R
where
    F: FnOnce(&TestServer) -> R,
{
    let server = TestServer::start();
    f(&server)
}

/// An ini file in a temporary directory.
pub struct TempOptFile {
    /// Path of the file.
    pub path: PathBuf,
    _dir: TempDir,
}

impl TempOptFile {
    /// Writes `contents` to a new file.
    pub fn new(contents: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("opt.ini");
        std::fs::write(&path, contents).expect("Failed to write opt file");
        Self { path, _dir: dir }
    }
}

/// Polls `condition` until it holds, panicking after `timeout`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "Condition not met within {timeout:?}");
        std::thread::sleep(Duration::from_millis(10));
    }
}
