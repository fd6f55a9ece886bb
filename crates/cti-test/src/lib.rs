//! Shared test utilities for the packed function call crates.
//!
//! - [`foreign`]: an in-process foreign runtime with real `extern "C"`
//!   entry points and sample functions, for end-to-end tests.
//! - [`MockBoundary`]: a scripted boundary that records lookups and calls.
//! - [`setup_test_logging`]: captured `tracing` output for tests.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! cti-test.workspace = true
//! ```

#![allow(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod foreign;
pub mod harness;
pub mod mocks;

pub use harness::*;
pub use mocks::*;
