//! CLI command implementations.

pub mod get;
pub mod list;
pub mod serve;
pub mod set;
pub mod watch;
