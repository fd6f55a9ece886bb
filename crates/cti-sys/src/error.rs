//! Boundary error types.

use thiserror::Error;

/// Errors raised while crossing the boundary.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// No callable is registered under the requested name.
    #[error("no callable named {name:?} under registry tag {tag:?}")]
    NameNotFound {
        /// Registry category that was searched.
        tag: String,
        /// The missing name.
        name: String,
    },

    /// A raw entry point returned a non-success status.
    #[error("boundary operation {operation} failed with status {status}")]
    CallFailed {
        /// Which entry point failed.
        operation: &'static str,
        /// Status code reported by the foreign side.
        status: i32,
    },

    /// A tag or name could not be passed across as a C string.
    #[error("invalid boundary string {0:?}: contains an interior NUL byte")]
    InteriorNul(String),

    /// The foreign side handed back text that is not valid UTF-8.
    #[error("boundary returned a name that is not valid UTF-8")]
    InvalidName,

    /// More arguments than the raw ABI can describe.
    #[error("too many arguments for one boundary call: {0}")]
    TooManyArguments(usize),

    /// The type code and payload arrays of a call differ in length.
    #[error("argument arrays differ in length: {codes} type codes, {values} payloads")]
    ArityMismatch {
        /// Number of type codes.
        codes: usize,
        /// Number of payloads.
        values: usize,
    },

    /// The foreign side reported a count that cannot describe a list.
    #[error("boundary operation {operation} reported an invalid count {count}")]
    InvalidCount {
        /// Which entry point reported it.
        operation: &'static str,
        /// The count as reported.
        count: i32,
    },
}

/// Result type for boundary operations.
pub type BoundaryResult<T> = Result<T, BoundaryError>;
