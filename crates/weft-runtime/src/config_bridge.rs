//! Bridge from `weft_config::WeaverConfig` to engine types.
//!
//! The config crate has no dependencies on other internal crates. Conversion
//! into the composition order, host identity and log settings happens here,
//! once.

use std::str::FromStr;

use weft_chain::{CompositionOrder, UnlistedPlacement};
use weft_config::WeaverConfig;
use weft_telemetry::{LogConfig, LogFormat};

use crate::error::RuntimeResult;

/// Convert the `[composition]` section to a [`CompositionOrder`].
///
/// Validation has already restricted `unlisted` to `last` or `first`.
#[must_use]
pub fn to_composition_order(cfg: &WeaverConfig) -> CompositionOrder {
    let placement = match cfg.composition.unlisted.as_str() {
        "first" => UnlistedPlacement::First,
        _ => UnlistedPlacement::Last,
    };
    CompositionOrder::new(cfg.composition.order.iter().cloned(), placement)
}

/// Convert the `[logging]` section to a [`LogConfig`].
///
/// # Errors
///
/// Returns an error if the log format is unknown.
pub fn to_log_config(cfg: &WeaverConfig) -> RuntimeResult<LogConfig> {
    let format = LogFormat::from_str(&cfg.logging.format)?;
    Ok(LogConfig::new(cfg.logging.level.to_ascii_lowercase())
        .with_format(format)
        .with_directives(cfg.logging.directives.iter().cloned()))
}

/// Install the global subscriber described by the `[logging]` section.
///
/// # Errors
///
/// Returns an error if the settings are invalid or a subscriber is already
/// installed.
pub fn init_logging(cfg: &WeaverConfig) -> RuntimeResult<()> {
    weft_telemetry::setup_logging(&to_log_config(cfg)?)?;
    Ok(())
}
