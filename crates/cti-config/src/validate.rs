//! Configuration validation rules.

use crate::error::{ConfigError, ConfigResult};
use crate::types::CtiConfig;

/// Upper bound on `codec.max_depth`.
pub const MAX_DEPTH_UPPER_BOUND: usize = 4096;

/// Validate a deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &CtiConfig) -> ConfigResult<()> {
    validate_registry(config)?;
    validate_codec(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_registry(config: &CtiConfig) -> ConfigResult<()> {
    let tag = &config.registry.tag;
    if tag.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "registry.tag".to_owned(),
            message: "tag must not be empty".to_owned(),
        });
    }
    if tag.contains('\0') {
        return Err(ConfigError::ValidationError {
            field: "registry.tag".to_owned(),
            message: "tag must not contain NUL bytes".to_owned(),
        });
    }
    Ok(())
}

fn validate_codec(config: &CtiConfig) -> ConfigResult<()> {
    let depth = config.codec.max_depth;
    if depth == 0 || depth > MAX_DEPTH_UPPER_BOUND {
        return Err(ConfigError::ValidationError {
            field: "codec.max_depth".to_owned(),
            message: format!(
                "max_depth {depth} is out of range; must be between 1 and {MAX_DEPTH_UPPER_BOUND}"
            ),
        });
    }
    Ok(())
}

fn validate_logging(config: &CtiConfig) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    Ok(())
}
