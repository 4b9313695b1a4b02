#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for the weft runtime.
//!
//! This crate provides a single [`WeaverConfig`] holding everything injected
//! into the engine at startup: the interceptor composition order, the host
//! identity matched by host selectors, and logging settings.
//!
//! # Usage
//!
//! ```rust,no_run
//! use weft_config::WeaverConfig;
//!
//! let resolved = WeaverConfig::load(None).unwrap();
//! println!("composition order: {:?}", resolved.config.composition.order);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** passed to [`WeaverConfig::load`]
//! 2. **User** (`weft.toml` in the platform config directory)
//! 3. **Environment variables** (`WEFT_HOST`, `WEFT_LOG`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! # Design
//!
//! This crate has **no dependencies on other internal weft crates**.
//! Conversion into engine types happens in `weft-runtime`.

pub mod prelude;

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with source tracking.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use merge::ConfigLayer;
pub use types::*;

impl WeaverConfig {
    /// Load configuration with full precedence chain.
    ///
    /// See [`loader::load`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(file: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(file, None)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse configuration from TOML text (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the text does not parse or fails
    /// validation.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        loader::from_toml_str(text)
    }
}
