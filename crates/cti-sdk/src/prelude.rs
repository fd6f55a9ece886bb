//! Commonly used types for convenient import.

pub use crate::{
    CtiError, CtiResult, ExtObject, ExtState, Extension, FromValue, Function, Lib, Ownership,
    TypeCode, Value,
};
pub use crate::{args, packed_call};
