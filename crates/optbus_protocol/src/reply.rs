//! Command channel replies: `<status CRLF>[payload]<prompt>`.

use crate::error::{ProtocolError, ProtocolResult};
use crate::status::{code_from_message, Status};
use crate::CRLF;
use optbus_core::ErrorCode;

/// Formats a full reply.
pub fn format_reply(status: &Status, payload: &str, prompt: &str) -> String {
    let mut out = status.to_line();
    out.push_str(payload);
    out.push_str(prompt);
    out
}

/// A parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code derived from the reason.
    pub code: ErrorCode,
    /// Status line without the leading digit, e.g. `OK` or `NOT FOUND: ...`.
    pub message: String,
    /// Everything between the status line and the prompt.
    pub payload: String,
}

impl Reply {
    /// Parses `text`, stripping a trailing `prompt` when present.
    pub fn parse(text: &str, prompt: &str) -> ProtocolResult<Self> {
        let body = text.strip_suffix(prompt).unwrap_or(text);
        let (status, payload) = body.split_once(CRLF).unwrap_or((body, ""));
        let (digit, message) = status.split_once(' ').unwrap_or((status, ""));
        let code = match digit {
            "0" => ErrorCode::Ok,
            "1" => match code_from_message(message) {
                ErrorCode::Ok => ErrorCode::Generic,
                code => code,
            },
            other => {
                return Err(ProtocolError::malformed_reply(format!(
                    "unexpected status {other:?}"
                )))
            }
        };
        Ok(Self {
            code,
            message: message.to_string(),
            payload: payload.to_string(),
        })
    }

    /// True for `0 OK`.
    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok
    }
}
