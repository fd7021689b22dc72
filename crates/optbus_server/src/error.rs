//! Error types for the sync server.

use optbus_core::OptError;
use optbus_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The peer never sent a usable handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Client disabled or wrong password.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The connection already has a socket on that channel.
    #[error("channel {mode} of connection {hash} is already attached")]
    ChannelBusy {
        /// Connection hash.
        hash: String,
        /// Mode letter.
        mode: char,
    },

    /// The connection table is full.
    #[error("too many connections (limit {max})")]
    TooManyConnections {
        /// Configured limit.
        max: usize,
    },

    /// The peer closed the socket.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A read or write did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Malformed wire data.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Registry operation failed.
    #[error("registry error: {0}")]
    Registry(#[from] OptError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if the peer caused the error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::Handshake(_)
                | ServerError::AuthenticationFailed(_)
                | ServerError::ChannelBusy { .. }
                | ServerError::ConnectionClosed
                | ServerError::Protocol(_)
        )
    }

    /// Returns true if the server is at fault.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ServerError::TooManyConnections { .. }
                | ServerError::Registry(_)
                | ServerError::Internal(_)
                | ServerError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::AuthenticationFailed("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::ConnectionClosed.is_server_error());
        assert!(!ServerError::Timeout("ack".into()).is_client_error());
    }

    #[test]
    fn error_display() {
        let err = ServerError::ChannelBusy {
            hash: "abc".into(),
            mode: 'w',
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains('w'));
    }
}
