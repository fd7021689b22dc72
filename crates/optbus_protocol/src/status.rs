//! Status lines: `0 OK` or `1 <REASON>[: detail]`, terminated by CRLF.

use crate::CRLF;
use optbus_core::{ErrorCode, OptError};

/// Outcome of a command as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: ErrorCode,
    detail: Option<String>,
}

impl Status {
    /// Success.
    pub fn ok() -> Self {
        Self {
            code: ErrorCode::Ok,
            detail: None,
        }
    }

    /// A failure with no detail.
    pub fn failure(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    /// A failure carrying the error message as detail.
    pub fn from_error(err: &OptError) -> Self {
        Self {
            code: err.code(),
            detail: Some(single_line(&err.to_string())),
        }
    }

    /// Maps a registry result.
    pub fn from_result<T>(result: &Result<T, OptError>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(err) => Self::from_error(err),
        }
    }

    /// The error code; success codes collapse to [`ErrorCode::Ok`].
    pub fn code(&self) -> ErrorCode {
        if self.code.is_success() {
            ErrorCode::Ok
        } else {
            self.code
        }
    }

    /// Returns true for success.
    pub fn is_ok(&self) -> bool {
        self.code.is_success()
    }

    /// Renders the line including CRLF.
    pub fn to_line(&self) -> String {
        match (&self.detail, self.is_ok()) {
            (_, true) => format!("0 OK{CRLF}"),
            (Some(detail), false) => format!("1 {}: {}{CRLF}", reason(self.code), detail),
            (None, false) => format!("1 {}{CRLF}", reason(self.code)),
        }
    }
}

/// The reason token for a code.
pub fn reason(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Ok | ErrorCode::UseDefault | ErrorCode::Ignore | ErrorCode::Skip => "OK",
        ErrorCode::Generic => "NG",
        ErrorCode::NotImplemented => "NOT IMPL",
        ErrorCode::BadType => "BAD TYPE",
        ErrorCode::Recursive => "RECUR",
        ErrorCode::NotInitialized => "NOT INIT",
        ErrorCode::NotFound => "NOT FOUND",
        ErrorCode::Forbidden => "FORBIDDEN",
        ErrorCode::BadCommand => "BAD COMMAND",
        ErrorCode::NothingDone => "NOTHING BEEN DONE",
        ErrorCode::AlreadyExists => "ENTRY ALREADY EXIST",
        ErrorCode::BadParameter => "BAD PARAM",
        ErrorCode::Cancelled => "CANCELLED",
        ErrorCode::ConnectFailed => "CONNECT FAILED",
    }
}

/// Maps a status message (the text after the leading digit) back to a code.
///
/// Accepts the historical `FORBIDEN` spelling. Unknown reasons map to
/// [`ErrorCode::Generic`].
pub fn code_from_message(message: &str) -> ErrorCode {
    let token = message.split(':').next().unwrap_or("").trim();
    match token {
        "OK" => ErrorCode::Ok,
        "NOT IMPL" => ErrorCode::NotImplemented,
        "BAD TYPE" => ErrorCode::BadType,
        "RECUR" => ErrorCode::Recursive,
        "NOT INIT" => ErrorCode::NotInitialized,
        "NOT FOUND" => ErrorCode::NotFound,
        "FORBIDDEN" | "FORBIDEN" => ErrorCode::Forbidden,
        "BAD COMMAND" => ErrorCode::BadCommand,
        "NOTHING BEEN DONE" => ErrorCode::NothingDone,
        "ENTRY ALREADY EXIST" => ErrorCode::AlreadyExists,
        "BAD PARAM" => ErrorCode::BadParameter,
        "CANCELLED" => ErrorCode::Cancelled,
        "CONNECT FAILED" => ErrorCode::ConnectFailed,
        _ => ErrorCode::Generic,
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
