//! Weft Telemetry - Logging for the weft interception engine.
//!
//! Library crates only emit `tracing` events, under the targets
//! `weft::wrapping`, `weft::exceptions`, `weft::roles`, `weft::pointcut` and
//! `weft::lifecycle`. This crate installs the subscriber that renders them.
//!
//! # Example
//!
//! ```rust,no_run
//! use weft_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), weft_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("weft::pointcut=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!(target: "weft::lifecycle", "weaver started");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
};
