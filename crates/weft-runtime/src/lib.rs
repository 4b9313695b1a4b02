//! Weft Runtime - The weaver facade.
//!
//! This crate wires the engine together from one [`WeaverConfig`]:
//!
//! ```text
//! WeaverConfig ─► CompositionOrder ─┐
//!                 ChainStore ───────┼─► Matcher ─► PointcutRegistry
//!                                   └─► Dispatcher (listener = registry)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use weft_runtime::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let weaver = Weaver::load(None)?;
//! let module = ModuleId::new();
//! let pointcut = weaver.pointcut("Audit")?.operations("SETTERS").build()?;
//! weaver.activate(module, vec![pointcut]);
//! # Ok(())
//! # }
//! ```
//!
//! [`WeaverConfig`]: weft_config::WeaverConfig

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod config_bridge;
mod error;
mod weaver;

pub use config_bridge::init_logging;
pub use error::{RuntimeError, RuntimeResult};
pub use weaver::Weaver;
