//! Prelude module - commonly used types for convenient import.
//!
//! Use `use weft_dispatch::prelude::*;` to import all essential types.

pub use crate::Dispatcher;

pub use weft_core::{CallError, CallGateway, CallResult, Fault, Invocation, Value};
