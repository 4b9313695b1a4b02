//! Config file discovery and layered loading.
//!
//! Implements the `WeaverConfig::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge the user's `weft.toml` (platform config dir)
//! 3. Merge the explicitly supplied file, if any
//! 4. Apply `WEFT_*` env var fallbacks for fields no file set
//! 5. Deserialize merged tree → `WeaverConfig`
//! 6. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::WeaverConfig;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A loaded configuration plus where its values came from.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// The merged, validated configuration.
    pub config: WeaverConfig,
    /// Layer that set each leaf field.
    pub field_sources: FieldSources,
    /// Files merged, in order.
    pub loaded_files: Vec<String>,
}

/// Default location of the user config file.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("rs", "weft", "weft")
        .map(|dirs| dirs.config_dir().join("weft.toml"))
}

/// Load the configuration with layered precedence.
///
/// `file` is an explicitly requested config file; unlike the user file it
/// must exist. `user_override` replaces the discovered user config path.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, if `file`
/// cannot be read, or if the final merged configuration fails validation.
pub fn load(file: Option<&Path>, user_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let user_path = user_override.map(Path::to_path_buf).or_else(user_config_path);
    load_with_env(file, user_path.as_deref(), &collect_env_vars())
}

/// [`load`] against an explicit environment.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    file: Option<&Path>,
    user_path: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Parse embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", ConfigLayer::Defaults, &mut field_sources);

    // 2. User config.
    if let Some(path) = user_path {
        if let Some(overlay) = try_load_file(path)? {
            deep_merge_tracking(&mut merged, &overlay, "", ConfigLayer::User, &mut field_sources);
            loaded_files.push(path.display().to_string());
            info!(path = %path.display(), "loaded user config");
        }
    }

    // 3. Explicit file.
    if let Some(path) = file {
        let overlay = read_file(path)?;
        deep_merge_tracking(&mut merged, &overlay, "", ConfigLayer::File, &mut field_sources);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded config file");
    }

    // 4. Env var fallbacks.
    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    // 5. Deserialize.
    let config: WeaverConfig =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 6. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<WeaverConfig> {
    let config: WeaverConfig = read_file(path)?
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Parse a config from TOML text (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the text does not parse or fails
/// validation.
pub fn from_toml_str(text: &str) -> ConfigResult<WeaverConfig> {
    let config: WeaverConfig = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: "<inline>".to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

fn read_file(path: &Path) -> ConfigResult<toml::Value> {
    try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })
}

/// Try to load a file, returning `None` if the file doesn't exist.
///
/// Uses a single read operation to avoid TOCTOU races (no separate
/// exists/metadata checks before reading).
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: WeaverConfig = toml::from_str(DEFAULTS_TOML).unwrap();
        assert!(config.composition.order.is_empty());
        assert_eq!(config.composition.unlisted, "last");
        assert_eq!(config.host.name, "localhost");
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_load_defaults_only() {
        let resolved = load_with_env(None, None, &no_env()).unwrap();
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(resolved.field_sources.get("host.name"), Some(&ConfigLayer::Defaults));
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        let explicit = dir.path().join("weft.toml");
        std::fs::write(
            &user,
            "[composition]\norder = [\"Auth\"]\n[host]\nname = \"user-host\"\n",
        )
        .unwrap();
        std::fs::write(&explicit, "[host]\nname = \"node1\"\n").unwrap();

        let resolved = load_with_env(Some(&explicit), Some(&user), &no_env()).unwrap();
        assert_eq!(resolved.config.composition.order, vec!["Auth"]);
        assert_eq!(resolved.config.host.name, "node1");
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(resolved.field_sources.get("host.name"), Some(&ConfigLayer::File));
        assert_eq!(
            resolved.field_sources.get("composition.order"),
            Some(&ConfigLayer::User)
        );
    }

    #[test]
    fn test_env_is_fallback_only() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("weft.toml");
        std::fs::write(&explicit, "[host]\nname = \"node1\"\n").unwrap();
        let env: HashMap<String, String> = [
            ("WEFT_HOST".to_owned(), "from-env".to_owned()),
            ("WEFT_LOG".to_owned(), "debug".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load_with_env(Some(&explicit), None, &env).unwrap();
        assert_eq!(resolved.config.host.name, "node1");
        assert_eq!(resolved.config.logging.level, "debug");
    }

    #[test]
    fn test_missing_user_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(load_with_env(None, Some(&missing), &no_env()).is_ok());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = load_with_env(Some(Path::new("/nonexistent/weft.toml")), None, &no_env());
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("weft.toml");
        std::fs::write(&explicit, "[composition]\norder = [\"A\", \"A\"]\n").unwrap();
        let result = load_with_env(Some(&explicit), None, &no_env());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("weft.toml");
        std::fs::write(&explicit, "[composition\n").unwrap();
        assert!(matches!(load_file(&explicit), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_from_toml_str() {
        let config = from_toml_str("[composition]\norder = [\"Auth\", \"Audit\"]\nunlisted = \"first\"").unwrap();
        assert_eq!(config.composition.unlisted, "first");
        assert!(from_toml_str("[host]\nname = \"\"").is_err());
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected ValidationError for oversized config, got: {result:?}"
        );
    }
}
