//! Config file loading.
//!
//! `load` resolves a configuration in three steps:
//! 1. Parse the embedded `defaults.toml`
//! 2. Overlay the optional config file, with `CTI_*` fallbacks for fields
//!    it leaves unset
//! 3. Deserialize and validate

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::types::CtiConfig;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MiB).
pub const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load configuration from defaults, an optional file and the process
/// environment.
///
/// A `path` that does not exist is skipped.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is unreadable, oversized or
/// malformed, or if the result fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<CtiConfig> {
    load_with_env(path, &collect_env_vars())
}

/// [`load`] with an explicit environment snapshot.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> ConfigResult<CtiConfig> {
    let mut merged: toml::Table =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut overlay = match path {
        Some(p) => match try_load_file(p)? {
            Some(table) => {
                info!(path = %p.display(), "loaded config file");
                table
            },
            None => toml::Table::new(),
        },
        None => toml::Table::new(),
    };

    let env_count = apply_env_fallbacks(&mut overlay, env)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    deep_merge(&mut merged, overlay);
    let config: CtiConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Load a config from a specific file path (no layering, no environment).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, is too large,
/// cannot be parsed or fails validation.
pub fn load_file(path: &Path) -> ConfigResult<CtiConfig> {
    let metadata = std::fs::metadata(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    check_size(path, metadata.len())?;

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_str(&content, &path.display().to_string())
}

/// Parse and validate a TOML document.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the document cannot be parsed or fails
/// validation.
pub fn from_toml_str(content: &str) -> ConfigResult<CtiConfig> {
    parse_str(content, "<string>")
}

fn parse_str(content: &str, origin: &str) -> ConfigResult<CtiConfig> {
    let config: CtiConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

fn check_size(path: &Path, len: u64) -> ConfigResult<()> {
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }
    Ok(())
}

/// Read a file as a TOML table, returning `None` if it doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Table>> {
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

    // Checked after reading so stat and read cannot race.
    check_size(path, u64::try_from(content.len()).unwrap_or(u64::MAX))?;

    let table: toml::Table = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(table))
}

/// Recursively merge `overlay` into `base`. Tables merge; anything else
/// replaces.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(b)), toml::Value::Table(o)) => deep_merge(b, o),
            (_, v) => {
                base.insert(key, v);
            },
        }
    }
}
