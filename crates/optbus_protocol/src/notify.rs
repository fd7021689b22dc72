//! Watch channel frames.

use crate::error::{ProtocolError, ProtocolResult};
use crate::CRLF;

/// Acknowledgement the client returns for every notification.
pub const ACK: &str = "ACK";

/// Sent by the server on the watch channel before it closes.
pub const BYE: &str = "bye";

const NOTIFY_PREFIX: &str = "wchnotify ";

/// `wchnotify <path>\r\n<value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchNotice {
    /// Entry that changed.
    pub path: String,
    /// Its value in text form.
    pub value: String,
}

impl WatchNotice {
    /// Creates a notice.
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Renders the frame text.
    pub fn to_text(&self) -> String {
        format!("{NOTIFY_PREFIX}{}{CRLF}{}", self.path, self.value)
    }

    /// Parses a frame.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let rest = text
            .strip_prefix(NOTIFY_PREFIX)
            .ok_or_else(|| ProtocolError::malformed_notification("missing wchnotify prefix"))?;
        let (path, value) = rest
            .split_once(CRLF)
            .ok_or_else(|| ProtocolError::malformed_notification("missing path terminator"))?;
        if path.is_empty() {
            return Err(ProtocolError::malformed_notification("empty path"));
        }
        Ok(Self::new(path, value))
    }
}

/// True when a watch channel frame asks the client to stop.
pub fn is_bye(text: &str) -> bool {
    text.trim().starts_with(BYE)
}
