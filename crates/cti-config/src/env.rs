//! Environment variable fallbacks.
//!
//! A variable only fills a field the config file left unset; it never
//! overrides an explicit file value.

use std::collections::HashMap;

use crate::error::{ConfigError, ConfigResult};

/// Fallback for `registry.tag`.
pub const ENV_REGISTRY_TAG: &str = "CTI_REGISTRY_TAG";
/// Fallback for `codec.max_depth`.
pub const ENV_MAX_DEPTH: &str = "CTI_MAX_DEPTH";
/// Fallback for `logging.level`.
pub const ENV_LOG_LEVEL: &str = "CTI_LOG";

/// Snapshot the `CTI_*` variables of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("CTI_"))
        .collect()
}

/// Fill unset fields of `layer` from `env`.
///
/// Returns how many fields were filled.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if `CTI_MAX_DEPTH` is not a
/// non-negative integer.
pub fn apply_env_fallbacks(
    layer: &mut toml::Table,
    env: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied = 0_usize;

    if let Some(tag) = env.get(ENV_REGISTRY_TAG)
        && set_if_absent(layer, "registry", "tag", toml::Value::String(tag.clone()))
    {
        applied = applied.saturating_add(1);
    }

    if let Some(raw) = env.get(ENV_MAX_DEPTH) {
        let depth: i64 = raw
            .trim()
            .parse()
            .ok()
            .filter(|d| *d >= 0)
            .ok_or_else(|| ConfigError::ValidationError {
                field: ENV_MAX_DEPTH.to_owned(),
                message: format!("'{raw}' is not a non-negative integer"),
            })?;
        if set_if_absent(layer, "codec", "max_depth", toml::Value::Integer(depth)) {
            applied = applied.saturating_add(1);
        }
    }

    if let Some(level) = env.get(ENV_LOG_LEVEL)
        && set_if_absent(
            layer,
            "logging",
            "level",
            toml::Value::String(level.to_ascii_lowercase()),
        )
    {
        applied = applied.saturating_add(1);
    }

    Ok(applied)
}

fn set_if_absent(layer: &mut toml::Table, section: &str, key: &str, value: toml::Value) -> bool {
    let entry = layer
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    let Some(table) = entry.as_table_mut() else {
        return false;
    };
    if table.contains_key(key) {
        return false;
    }
    table.insert(key.to_owned(), value);
    true
}
