//! Error types shared by the codec, the registry and the invoker.

use cti_sys::{BoundaryError, TypeCode};
use thiserror::Error;

/// Errors produced while marshaling values or invoking packed functions.
///
/// None of these are retried. Encode failures are raised before any
/// boundary call is issued. A decode failure after a completed call cannot
/// undo what the foreign side already did.
#[derive(Debug, Error)]
pub enum CtiError {
    /// The native value matches no built-in or registered extension kind.
    #[error("unsupported value kind: {0}")]
    UnsupportedValueKind(String),

    /// Vector elements do not all encode to the same type code.
    #[error("inconsistent vector element type: expected {expected}, found {found} at index {index}")]
    InconsistentVectorType {
        /// Kind of the first element.
        expected: TypeCode,
        /// Kind of the offending element.
        found: TypeCode,
        /// Position of the offending element.
        index: usize,
    },

    /// The code is `Unknown` or neither built-in nor registered.
    #[error("unknown type code {0}")]
    UnknownTypeCode(TypeCode),

    /// The code is already taken by a built-in or an extension.
    #[error("type code {0} is already registered")]
    DuplicateTypeCode(TypeCode),

    /// The name is already taken by a built-in or an extension.
    #[error("type name {0:?} is already registered")]
    DuplicateTypeName(String),

    /// Registry lookup miss.
    #[error("no callable named {name:?} under registry tag {tag:?}")]
    NameNotFound {
        /// Registry category that was searched.
        tag: String,
        /// The missing name.
        name: String,
    },

    /// The foreign call itself signalled failure.
    #[error("boundary call failed: {0}")]
    BoundaryCallFailed(#[source] BoundaryError),

    /// A decoded value is not of the kind the caller asked for.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// What the caller asked for.
        expected: &'static str,
        /// What the value actually was.
        found: String,
    },

    /// A string cannot cross the boundary (interior NUL or not UTF-8).
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// A payload that must reference memory carried a null pointer.
    #[error("null payload for type code {0}")]
    NullPayload(TypeCode),

    /// Nesting exceeded the configured depth limit.
    #[error("value nesting exceeds the depth limit of {limit}")]
    NestingTooDeep {
        /// The configured limit.
        limit: usize,
    },
}

impl From<BoundaryError> for CtiError {
    fn from(err: BoundaryError) -> Self {
        match err {
            BoundaryError::NameNotFound { tag, name } => Self::NameNotFound { tag, name },
            other => Self::BoundaryCallFailed(other),
        }
    }
}

/// Result type for codec and invocation operations.
pub type CtiResult<T> = Result<T, CtiError>;
