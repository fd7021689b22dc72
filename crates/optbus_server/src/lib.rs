//! # OptBus Sync Server
//!
//! Exposes a [`Registry`](optbus_core::Registry) to other processes over TCP.
//!
//! This crate provides:
//! - The reactor: one thread, one single-threaded tokio runtime
//! - Handshake and authentication against entries of the registry itself
//! - A connection table pairing each client's command and watch sockets
//! - Command handling (`wa`, `wd`, `os`, `og`, `bye`, `help`)
//! - Remote watches that push `wchnotify` frames and wait for the ACK
//!
//! # Authentication
//!
//! A handshake is accepted when `b:/sys/admin/<client>/enable` is non-zero
//! and `s:/sys/usr/<user>/passwd` equals the password. Failures close the
//! socket without a reply.
//!
//! ```rust,ignore
//! use optbus_server::{provision_client, provision_user};
//!
//! provision_client(&registry, "tool")?;
//! provision_user(&registry, "admin", "secret")?;
//! ```
//!
//! # Watch delivery
//!
//! A remote watch runs synchronously inside the local set that triggered
//! it, so a slow client delays that set. The wait is bounded by
//! [`ServerConfig::watch_ack_timeout`]; a client that misses it is
//! disconnected.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod connection;
mod error;
mod handler;
mod server;

pub use auth::{
    check_credentials, client_enable_path, provision_client, provision_user, user_password_path,
};
pub use config::{ServerConfig, DEFAULT_PORT};
pub use connection::{Connection, ConnectionTable};
pub use error::{ServerError, ServerResult};
pub use handler::{CommandHandler, HandlerOutcome};
pub use server::{ServerHandle, SyncServer};
