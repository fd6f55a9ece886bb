#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the packed function call runtime.
//!
//! # Usage
//!
//! ```rust,no_run
//! use cti_config::CtiConfig;
//!
//! let config = CtiConfig::load(Some(std::path::Path::new("cti.toml"))).unwrap();
//! println!("registry tag: {}", config.registry.tag);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. The config file passed to [`CtiConfig::load`]
//! 2. Environment variables (`CTI_REGISTRY_TAG`, `CTI_MAX_DEPTH`,
//!    `CTI_LOG`), for fields the file leaves unset
//! 3. Embedded defaults (`defaults.toml` compiled into the binary)

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl CtiConfig {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed or the final
    /// configuration fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(path)
    }

    /// Load one file with no layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document cannot be parsed or
    /// validated.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::from_toml_str(content)
    }
}
