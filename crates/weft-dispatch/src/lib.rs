//! Weft Dispatch - Running intercepted calls.
//!
//! This crate provides:
//! - [`Dispatcher`]: executes a target's chain for an operation, applies
//!   the catch chain on failure and resolves role operations
//!
//! The per-call state itself ([`weft_core::Invocation`]) lives in
//! `weft-core` so interceptors can be written against the core crate alone.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_dispatch::prelude::*;
//!
//! let dispatcher = Dispatcher::new(store).with_listener(registry);
//! let balance = dispatcher.invoke(&target, &get_balance, vec![])?;
//! let peers = dispatcher.invoke_role(&target, "peers", vec![], Some("Replication"));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod dispatcher;

pub use dispatcher::Dispatcher;
