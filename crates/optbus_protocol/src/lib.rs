//! # OptBus Protocol
//!
//! Wire format shared by the sync server and client.
//!
//! This crate is pure: it has no I/O and no async code. It provides:
//! - NUL-terminated framing with a bounded decoder
//! - The `hey` handshake and its prompt-carrying acknowledgement
//! - Command requests (`wa`, `wd`, `os`, `og`, `bye`, `help`)
//! - Status lines and replies
//! - `wchnotify` watch frames and their acknowledgement
//!
//! # Channels
//!
//! Each client opens a command channel (`o`) and, optionally, a watch
//! channel (`w`). Both sockets present the same connection hash in their
//! handshake so the server can pair them.
//!
//! ```
//! use optbus_protocol::{Command, WatchNotice};
//!
//! assert_eq!(Command::parse("og s:/k/opt/diag/list"), Command::Get("s:/k/opt/diag/list".into()));
//! let notice = WatchNotice::parse("wchnotify s:/x\r\nhello").unwrap();
//! assert_eq!(notice.value, "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod command;
mod error;
mod frame;
mod handshake;
mod notify;
mod reply;
mod status;

pub use command::{Command, HELP_TEXT};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{encode_frame, FrameDecoder, Framing, DEFAULT_MAX_FRAME, TERMINATOR};
pub use handshake::{
    format_bad_greeting, format_handshake_ack, parse_handshake_ack, prompt_for, ChannelMode,
    Greeting, Handshake, BARE_PROMPT,
};
pub use notify::{is_bye, WatchNotice, ACK, BYE};
pub use reply::{format_reply, Reply};
pub use status::{code_from_message, reason, Status};

/// Line terminator used inside frames.
pub const CRLF: &str = "\r\n";
