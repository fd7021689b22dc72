//! # OptBus Core
//!
//! A process-local registry of typed, path-addressed entries.
//!
//! This crate provides:
//! - Entries typed by their path tag (`i:/`, `s:/`, `d:/`, ...)
//! - Setter, getter and deleter hooks
//! - Before and after watches, including watches on paths not registered yet
//! - Sessions with an aggregated completion result
//! - The `key=value` text format used by batches, files and the wire protocol
//!
//! # Paths
//!
//! | Tag | Type    | Stored as            |
//! |-----|---------|----------------------|
//! | `a` | array   | `Value::Array`       |
//! | `b` | bool    | `Value::Int`         |
//! | `d` | blob    | `Value::Blob`        |
//! | `e` | event   | `Value::Int` (count) |
//! | `i` | int     | `Value::Int`         |
//! | `s` | string  | `Value::Str`         |
//! | `p` | pointer | `Value::Pointer`     |
//!
//! # Concurrency
//!
//! The registry is `Send + Sync`. Sets, gets and deletes run one pipeline
//! at a time across the whole registry. The thread running a pipeline may
//! reenter the registry from its hooks and watchers: other entries work as
//! usual, its own entry gets [`OptError::Recursive`]. No map or entry lock
//! is held while hooks and watchers run.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod batch;
pub mod builtin;
mod entry;
mod error;
mod hooks;
pub mod ini;
mod registry;
mod session;
mod types;
mod watch;

pub use batch::BatchOptions;
pub use entry::{EntryInfo, EntryState, EntryStats};
pub use error::{ErrorCode, OptError, OptResult};
pub use hooks::{Deleter, GetContext, Getter, Hooks, SetContext, SetOutcome, Setter};
pub use registry::{matches_pattern, Registry, SetStatus};
pub use types::{Attributes, SessionId, Value, ValueType, WatchPhase};
pub use watch::{WatchCallback, WatchEvent, WatchHandle, WatchId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
