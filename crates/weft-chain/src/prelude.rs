//! Prelude module - commonly used types for convenient import.
//!
//! Use `use weft_chain::prelude::*;` to import all essential types.

pub use crate::{
    CatchEntry, CatchSnapshot, ChainStore, CompositionOrder, InterceptorChain, UnlistedPlacement,
};
