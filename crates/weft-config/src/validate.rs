//! Post-merge configuration validation.

use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};
use crate::types::WeaverConfig;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &WeaverConfig) -> ConfigResult<()> {
    validate_composition(config)?;
    validate_host(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_composition(config: &WeaverConfig) -> ConfigResult<()> {
    let c = &config.composition;

    let mut seen = HashSet::new();
    for (i, name) in c.order.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(invalid(
                format!("composition.order[{i}]"),
                "interceptor type name is empty",
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(invalid(
                format!("composition.order[{i}]"),
                format!("interceptor type '{name}' is listed more than once"),
            ));
        }
    }

    if !matches!(c.unlisted.as_str(), "last" | "first") {
        return Err(invalid(
            "composition.unlisted",
            format!("unsupported placement '{}'; expected one of: last, first", c.unlisted),
        ));
    }
    Ok(())
}

fn validate_host(config: &WeaverConfig) -> ConfigResult<()> {
    if config.host.name.trim().is_empty() {
        return Err(invalid("host.name", "host name must not be empty"));
    }
    Ok(())
}

fn validate_logging(config: &WeaverConfig) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported level '{}'; expected one of: trace, debug, info, warn, error",
                l.level
            ),
        ));
    }

    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }
    Ok(())
}
