//! Weft Test - Shared test utilities for the weft engine.
//!
//! This crate provides fixture types, recording interceptors and logging
//! helpers that can be used across multiple weft crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! weft-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! #[cfg(test)]
//! mod tests {
//!     use weft_test::prelude::*;
//!
//!     #[test]
//!     fn test_recording() {
//!         let log = CallLog::new();
//!         let audit = RecordingInterceptor::handle("Audit", &log);
//!         let account = test_account();
//!         // ... wrap and dispatch
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
