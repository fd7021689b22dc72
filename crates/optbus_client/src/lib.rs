//! # OptBus Sync Client
//!
//! Blocking client for the OptBus sync server.
//!
//! A client opens up to two sockets to the server:
//! - the command channel, for `og`, `os`, `wa`, `wd`, `help` and `bye`
//! - the watch channel, opened only when a watch handler is supplied, on
//!   which a dedicated thread receives `wchnotify` frames, calls the handler
//!   and acknowledges each one
//!
//! Failures are returned as [`ClientError`]; the status message of the last
//! reply is also kept on the client ([`SyncClient::last_error`]).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod channel;
mod client;
mod config;
mod error;
mod hash;
mod watch;

pub use client::SyncClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use hash::{connection_hash, HASH_LEN};
pub use watch::{ClientWatchEvent, WatchHandler};
