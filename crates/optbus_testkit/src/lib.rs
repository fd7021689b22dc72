//! # OptBus Testkit
//!
//! Test utilities for OptBus.
//!
//! This crate provides:
//! - A sync server fixture on an ephemeral port with provisioned credentials
//! - Temporary ini files
//! - Property-based generators for paths, values and batches
//!
//! ## Usage
//!
//! ```rust,ignore
//! use optbus_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_server() {
//!     with_test_server(|server| {
//!         server.registry.register_default("s:/x").unwrap();
//!         // ... connect to server.port() with TEST_USER / TEST_PASSWORD
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
