//! Raw wire layout and boundary ABI for packed function calls.
//!
//! This crate is the lowest layer. It defines the fixed-size tagged value
//! representation, the three raw entry points a foreign runtime exports,
//! and the [`Boundary`] trait through which everything above crosses into
//! that runtime. All ergonomic marshaling lives in `cti-core` and
//! `cti-sdk`.

#![allow(unsafe_code)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod abi;
pub mod boundary;
pub mod error;
pub mod wire;

pub use abi::{AbiTable, CTI_SUCCESS, GetFn, ListNamesFn, PACKED_FUNC_TAG, PackedFuncCallFn};
pub use boundary::{AbiBoundary, Boundary};
pub use error::{BoundaryError, BoundaryResult};
pub use wire::{PackedValue, PackedVector, RawArg, RawHandle, TypeCode};
