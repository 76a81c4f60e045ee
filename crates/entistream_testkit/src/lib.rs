//! # Entistream Testkit
//!
//! Test utilities for entistream.
//!
//! This crate provides:
//! - Wire-format fixtures and a stream builder
//! - Scripted sources, recording sinks and fake HTTP clients
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entistream_testkit::prelude::*;
//!
//! #[test]
//! fn reads_two_pages() {
//!     let client = ScriptedClient::pages([people_page(0, 3, false), people_page(1, 3, true)]);
//!     // ... build an HttpSource over the client
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod doubles;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::doubles::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use doubles::*;
pub use fixtures::*;
pub use generators::*;
