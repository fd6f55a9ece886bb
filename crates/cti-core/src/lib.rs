//! Value codec and extensible type registry for packed function calls.
//!
//! Sits between the raw wire layout in `cti-sys` and the ergonomic call
//! surface in `cti-sdk`:
//!
//! - [`value`]: the native [`Value`] model and typed conversions.
//! - [`registry`]: the append-only [`TypeRegistry`] of built-in and
//!   extension kinds.
//! - [`codec`]: [`Encoder`] and [`Decoder`] between values and tagged wire
//!   payloads, plus [`classify`] for dynamically-typed inputs.

#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

#[allow(unsafe_code)]
pub mod codec;
pub mod error;
pub mod registry;
pub mod value;

pub use codec::{DEFAULT_MAX_DEPTH, Decoder, Encoder, PackedArgs, classify};
pub use error::{CtiError, CtiResult};
pub use registry::{ExtensionHooks, Ownership, ProbeFn, TypeEntry, TypeRegistry};
pub use value::{ExtValue, FromValue, FuncRef, Value};

// Re-exported so downstream crates need not depend on `cti-sys` for the
// common wire types.
pub use cti_sys::{RawArg, RawHandle, TypeCode};
