//! Prelude module - commonly used types for convenient import.
//!
//! Use `use weft_config::prelude::*;` to import all essential types.

pub use crate::{
    CompositionSection, ConfigError, ConfigResult, HostSection, LoggingSection, ResolvedConfig,
    WeaverConfig,
};
