//! Logging setup for the packed function call runtime.
//!
//! Installs a `tracing-subscriber` pipeline with a configurable format,
//! output stream and per-crate directives. Library crates only emit
//! `tracing` events; binaries and tests decide where they go.
//!
//! # Example
//!
//! ```rust,no_run
//! use cti_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), cti_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("cti_sys=trace");
//! setup_logging(&config)?;
//! tracing::info!("ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
