//! Error types for the sync client.

use optbus_core::{ErrorCode, OptError};
use optbus_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by [`SyncClient`](crate::SyncClient).
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with a failure status.
    #[error("server replied {message}")]
    Remote {
        /// Code derived from the reason.
        code: ErrorCode,
        /// Status line without the leading digit.
        message: String,
    },

    /// Connecting or handshaking failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection is closed.
    #[error("connection closed")]
    Closed,

    /// Malformed data from the server.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A reply payload did not parse as the requested type.
    #[error("bad value: {0}")]
    Value(#[from] OptError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// The registry code closest to this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Remote { code, .. } => *code,
            ClientError::ConnectFailed(_) => ErrorCode::ConnectFailed,
            ClientError::Value(err) => err.code(),
            ClientError::Closed | ClientError::Protocol(_) | ClientError::Io(_) => {
                ErrorCode::Generic
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        let remote = ClientError::Remote {
            code: ErrorCode::NotFound,
            message: "NOT FOUND: entry not found: s:/x".into(),
        };
        assert_eq!(remote.code(), ErrorCode::NotFound);
        assert_eq!(
            ClientError::ConnectFailed("refused".into()).code(),
            ErrorCode::ConnectFailed
        );
        assert_eq!(
            ClientError::Value(OptError::bad_parameter("x")).code(),
            ErrorCode::BadParameter
        );
    }

    #[test]
    fn error_display() {
        let err = ClientError::Remote {
            code: ErrorCode::Forbidden,
            message: "FORBIDDEN".into(),
        };
        assert_eq!(err.to_string(), "server replied FORBIDDEN");
    }
}
