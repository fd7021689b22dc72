//! Error types for protocol parsing.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while framing or parsing protocol text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A frame grew past the configured limit without a terminator.
    #[error("frame too large: {size} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// The limit.
        max: usize,
    },

    /// A frame was not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    /// Malformed handshake.
    #[error("invalid handshake: {message}")]
    InvalidHandshake {
        /// What was wrong.
        message: String,
    },

    /// Malformed reply from the server.
    #[error("malformed reply: {message}")]
    MalformedReply {
        /// What was wrong.
        message: String,
    },

    /// Malformed watch notification.
    #[error("malformed notification: {message}")]
    MalformedNotification {
        /// What was wrong.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an invalid handshake error.
    pub fn invalid_handshake(message: impl Into<String>) -> Self {
        Self::InvalidHandshake {
            message: message.into(),
        }
    }

    /// Creates a malformed reply error.
    pub fn malformed_reply(message: impl Into<String>) -> Self {
        Self::MalformedReply {
            message: message.into(),
        }
    }

    /// Creates a malformed notification error.
    pub fn malformed_notification(message: impl Into<String>) -> Self {
        Self::MalformedNotification {
            message: message.into(),
        }
    }
}
