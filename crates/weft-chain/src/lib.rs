//! Weft Chain - Interceptor chains and their ordering.
//!
//! This crate provides:
//! - [`ChainStore`]: per-scope interceptor chains, catch chains and attached
//!   sets, keyed weakly by target
//! - [`InterceptorChain`]: a copy-on-write, duplicate-free ordered chain
//! - [`CompositionOrder`]: the configured ranking used to pick insertion
//!   positions
//! - [`SweepSchedule`]: amortized sweeping of weakly held targets
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_chain::prelude::*;
//!
//! let order = CompositionOrder::new(["Auth", "Audit"], UnlistedPlacement::Last);
//! let store = ChainStore::new();
//! store.insert_ranked(&target, &operation, audit, &order);
//! store.insert_ranked(&target, &operation, auth, &order);
//! // Chain is now [Auth, Audit].
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod catch;
mod chain;
mod order;
mod store;
mod sweep;

pub use catch::{CatchEntry, CatchSnapshot};
pub use chain::InterceptorChain;
pub use order::{CompositionOrder, UnlistedPlacement};
pub use store::ChainStore;
pub use sweep::{DEFAULT_SWEEP_FLOOR, SweepSchedule};
