//! Server configuration.

use optbus_protocol::DEFAULT_MAX_FRAME;
use std::net::SocketAddr;
use std::time::Duration;

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 9000;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum number of connection records.
    pub max_connections: usize,
    /// Read/write timeout for handshakes and watch sockets.
    pub io_timeout: Duration,
    /// Frames read from a new socket before the handshake is given up.
    pub handshake_attempts: usize,
    /// How long a remote watch notification may wait for its acknowledgement.
    pub watch_ack_timeout: Duration,
    /// Largest accepted frame.
    pub max_frame: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 1000,
            io_timeout: Duration::from_secs(5),
            handshake_attempts: 3,
            watch_ack_timeout: Duration::from_secs(5),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Binds to `127.0.0.1:<port>`; port 0 picks a free port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Sets the maximum number of connection records.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the socket I/O timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets how many frames a handshake may take.
    pub fn with_handshake_attempts(mut self, attempts: usize) -> Self {
        self.handshake_attempts = attempts;
        self
    }

    /// Sets the watch acknowledgement timeout.
    pub fn with_watch_ack_timeout(mut self, timeout: Duration) -> Self {
        self.watch_ack_timeout = timeout;
        self
    }

    /// Sets the largest accepted frame.
    pub fn with_max_frame(mut self, max: usize) -> Self {
        self.max_frame = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }
}
