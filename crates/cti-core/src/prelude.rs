//! Common imports for code that marshals packed values.
//!
//! ```
//! use cti_core::prelude::*;
//! ```

pub use crate::{
    CtiError, CtiResult, Decoder, Encoder, ExtValue, FromValue, FuncRef, Ownership, RawHandle,
    TypeCode, TypeRegistry, Value,
};
