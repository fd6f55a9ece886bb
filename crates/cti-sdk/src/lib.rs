//! Safe calling surface for packed foreign functions.
//!
//! Wraps the wire layer of `cti-sys` and the codec of `cti-core` into
//! named, callable [`Function`] handles and lifecycle-tracked
//! [`ExtObject`]s.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cti_sdk::{Lib, packed_call};
//!
//! let lib = Lib::new(Arc::new(boundary));
//! let hello = lib.function("hello")?;
//! let sum: i64 = hello.call_as(&cti_sdk::args![1, 2])?;
//! let joined = packed_call!(lib.function("append_str")?, "hello", "world")?;
//! ```

#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod extension;
pub mod function;
#[allow(unsafe_code)]
mod invoke;
#[allow(unsafe_code)]
pub mod library;
mod macros;

pub use extension::{ExtObject, ExtState, Extension, register_extension};
pub use function::Function;
pub use library::Lib;

pub use cti_core::{
    CtiError, CtiResult, ExtValue, FromValue, FuncRef, Ownership, RawHandle, TypeCode,
    TypeRegistry, Value, classify,
};
