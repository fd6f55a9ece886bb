//! Configuration struct definitions.

use serde::{Deserialize, Serialize};

/// Default registry category for packed functions.
pub const DEFAULT_REGISTRY_TAG: &str = "PackedFunc";

/// Default vector nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtiConfig {
    /// Foreign registry lookup.
    pub registry: RegistrySection,
    /// Value codec limits.
    pub codec: CodecSection,
    /// Logging and tracing.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// RegistrySection
// ---------------------------------------------------------------------------

/// Foreign registry lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// Category searched when a function is fetched by name alone.
    pub tag: String,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            tag: DEFAULT_REGISTRY_TAG.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// CodecSection
// ---------------------------------------------------------------------------

/// Value codec limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSection {
    /// Deepest vector nesting accepted in either direction.
    pub max_depth: usize,
}

impl Default for CodecSection {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["cti_sys=trace"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
