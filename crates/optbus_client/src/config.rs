//! Client configuration.

use std::fmt;
use std::time::Duration;

/// Connection settings for [`SyncClient`](crate::SyncClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub server: String,
    /// Server port.
    pub port: u16,
    /// Client name sent in the handshake.
    pub client_name: String,
    /// User name sent in the handshake.
    pub user: String,
    /// Password sent in the handshake.
    pub password: String,
    /// Connect, read and write timeout for the command channel.
    pub io_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for `server:port`.
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            client_name: "optbus".to_string(),
            user: "admin".to_string(),
            password: String::new(),
            io_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the client name.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Sets user name and password.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Sets the I/O timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 9000)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("client_name", &self.client_name)
            .field("user", &self.user)
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.io_timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_builder() {
        let config = ClientConfig::new("opt.local", 7000)
            .with_client_name("probe")
            .with_credentials("ops", "hunter2")
            .with_io_timeout(Duration::from_millis(500));

        assert_eq!(config.client_name, "probe");
        assert_eq!(config.user, "ops");
        assert_eq!(config.password, "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
