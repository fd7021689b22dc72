//! Error types for the option registry.

use std::io;
use thiserror::Error;

/// Result type for registry operations.
pub type OptResult<T> = Result<T, OptError>;

/// Numeric status codes shared by the registry and the wire protocol.
///
/// The first four are non-error outcomes; everything else is a failure.
/// The values are stable and appear on the wire in batch error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Success.
    Ok = 0,
    /// Hook asks the registry to apply its default behaviour.
    UseDefault = 1,
    /// Hook ignored the request.
    Ignore = 2,
    /// Hook aborted the set; after-watchers are not run.
    Skip = 3,
    /// Unspecified failure.
    Generic = 0xFFFF_FFFF,
    /// Operation is not implemented.
    NotImplemented = 0x8001_0000,
    /// Path tag or value type mismatch.
    BadType = 0x8002_0000,
    /// Nested call on an entry that is already busy.
    Recursive = 0x8003_0000,
    /// Component used before initialization.
    NotInitialized = 0x8004_0000,
    /// No entry with that path.
    NotFound = 0x8005_0000,
    /// Operation not permitted by the entry attributes.
    Forbidden = 0x8006_0000,
    /// Malformed command.
    BadCommand = 0x8007_0000,
    /// Request understood but nothing was done.
    NothingDone = 0x8008_0000,
    /// Entry or watch already exists.
    AlreadyExists = 0x8009_0000,
    /// Argument could not be parsed or is out of range.
    BadParameter = 0x800a_0000,
    /// Operation was cancelled.
    Cancelled = 0x800b_0000,
    /// Connection could not be established.
    ConnectFailed = 0x800c_0000,
}

impl ErrorCode {
    /// Returns the raw numeric value.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Maps a raw value back to a known code.
    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        const ALL: [ErrorCode; 17] = [
            ErrorCode::Ok,
            ErrorCode::UseDefault,
            ErrorCode::Ignore,
            ErrorCode::Skip,
            ErrorCode::Generic,
            ErrorCode::NotImplemented,
            ErrorCode::BadType,
            ErrorCode::Recursive,
            ErrorCode::NotInitialized,
            ErrorCode::NotFound,
            ErrorCode::Forbidden,
            ErrorCode::BadCommand,
            ErrorCode::NothingDone,
            ErrorCode::AlreadyExists,
            ErrorCode::BadParameter,
            ErrorCode::Cancelled,
            ErrorCode::ConnectFailed,
        ];
        ALL.into_iter().find(|code| code.as_u32() == raw)
    }

    /// Returns true for the non-error outcomes.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ErrorCode::Ok | ErrorCode::UseDefault | ErrorCode::Ignore | ErrorCode::Skip
        )
    }
}

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum OptError {
    /// Unspecified failure, usually reported by a hook.
    #[error("operation failed: {message}")]
    Generic {
        /// Description of the failure.
        message: String,
    },

    /// Operation is not implemented.
    #[error("not implemented: {message}")]
    NotImplemented {
        /// What is missing.
        message: String,
    },

    /// Path tag or value type mismatch.
    #[error("bad type: {message}")]
    BadType {
        /// Description of the mismatch.
        message: String,
    },

    /// The entry is already inside a set, get or delete on this thread.
    #[error("recursive access to {path}")]
    Recursive {
        /// Path of the busy entry.
        path: String,
    },

    /// Component used before initialization.
    #[error("not initialized: {message}")]
    NotInitialized {
        /// What was not initialized.
        message: String,
    },

    /// No entry with the given path.
    #[error("entry not found: {path}")]
    NotFound {
        /// The path that was looked up.
        path: String,
    },

    /// Operation not permitted by the entry attributes.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Why the operation was refused.
        message: String,
    },

    /// Malformed command.
    #[error("bad command: {message}")]
    BadCommand {
        /// The offending command.
        message: String,
    },

    /// Request understood but nothing was done.
    #[error("nothing done: {message}")]
    NothingDone {
        /// Description.
        message: String,
    },

    /// Entry or watch already exists.
    #[error("already exists: {path}")]
    AlreadyExists {
        /// The duplicated path.
        path: String,
    },

    /// Argument could not be parsed or is out of range.
    #[error("bad parameter: {message}")]
    BadParameter {
        /// Description of the bad parameter.
        message: String,
    },

    /// Operation was cancelled.
    #[error("cancelled: {message}")]
    Cancelled {
        /// Description.
        message: String,
    },

    /// Connection could not be established.
    #[error("connect failed: {message}")]
    ConnectFailed {
        /// Description.
        message: String,
    },

    /// Session-done watchers reported error bits on commit.
    #[error("session rejected by watchers: {bits:#x}")]
    SessionRejected {
        /// Union of the reported bits.
        bits: u32,
    },

    /// I/O error while loading a file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl OptError {
    /// Creates a generic error.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Creates a not implemented error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
        }
    }

    /// Creates a bad type error.
    pub fn bad_type(message: impl Into<String>) -> Self {
        Self::BadType {
            message: message.into(),
        }
    }

    /// Creates a recursive access error.
    pub fn recursive(path: impl Into<String>) -> Self {
        Self::Recursive { path: path.into() }
    }

    /// Creates a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a bad command error.
    pub fn bad_command(message: impl Into<String>) -> Self {
        Self::BadCommand {
            message: message.into(),
        }
    }

    /// Creates a nothing done error.
    pub fn nothing_done(message: impl Into<String>) -> Self {
        Self::NothingDone {
            message: message.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    /// Creates a bad parameter error.
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter {
            message: message.into(),
        }
    }

    /// Creates a cancelled error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Returns the numeric code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            OptError::Generic { .. } | OptError::SessionRejected { .. } | OptError::Io(_) => {
                ErrorCode::Generic
            }
            OptError::NotImplemented { .. } => ErrorCode::NotImplemented,
            OptError::BadType { .. } => ErrorCode::BadType,
            OptError::Recursive { .. } => ErrorCode::Recursive,
            OptError::NotInitialized { .. } => ErrorCode::NotInitialized,
            OptError::NotFound { .. } => ErrorCode::NotFound,
            OptError::Forbidden { .. } => ErrorCode::Forbidden,
            OptError::BadCommand { .. } => ErrorCode::BadCommand,
            OptError::NothingDone { .. } => ErrorCode::NothingDone,
            OptError::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            OptError::BadParameter { .. } => ErrorCode::BadParameter,
            OptError::Cancelled { .. } => ErrorCode::Cancelled,
            OptError::ConnectFailed { .. } => ErrorCode::ConnectFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_raw() {
        for code in [
            ErrorCode::Ok,
            ErrorCode::Generic,
            ErrorCode::BadType,
            ErrorCode::ConnectFailed,
        ] {
            assert_eq!(ErrorCode::from_u32(code.as_u32()), Some(code));
        }
        assert_eq!(ErrorCode::from_u32(0x1234), None);
    }

    #[test]
    fn error_codes_match_variants() {
        assert_eq!(OptError::bad_type("x").code(), ErrorCode::BadType);
        assert_eq!(OptError::not_found("s:/x").code(), ErrorCode::NotFound);
        assert_eq!(
            OptError::SessionRejected { bits: 3 }.code(),
            ErrorCode::Generic
        );
        assert_eq!(ErrorCode::Generic.as_u32(), u32::MAX);
    }

    #[test]
    fn success_codes() {
        assert!(ErrorCode::Skip.is_success());
        assert!(!ErrorCode::Forbidden.is_success());
    }

    #[test]
    fn error_display() {
        let err = OptError::recursive("i:/a");
        assert!(err.to_string().contains("i:/a"));
    }
}
