//! Native values that can cross the boundary.

use cti_sys::{RawHandle, TypeCode};

use crate::error::{CtiError, CtiResult};

/// Reference to a foreign callable.
///
/// Carries no arity or type metadata; arguments are interpreted by the
/// callee at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncRef(RawHandle);

impl FuncRef {
    /// Wrap a callable handle.
    #[must_use]
    pub const fn new(handle: RawHandle) -> Self {
        Self(handle)
    }

    /// The bare handle.
    #[must_use]
    pub const fn handle(self) -> RawHandle {
        self.0
    }
}

/// An extension object as it travels: its kind and its bare handle.
///
/// Ownership is not part of the value. Whoever decodes it decides whether
/// it wraps the handle as owned or borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtValue {
    /// Registered extension code.
    pub type_code: TypeCode,
    /// Foreign handle.
    pub handle: RawHandle,
}

impl ExtValue {
    /// Pair an extension code with a handle.
    #[must_use]
    pub const fn new(type_code: TypeCode, handle: RawHandle) -> Self {
        Self { type_code, handle }
    }
}

/// A native value in one of the packed kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `Int64`.
    Int(i64),
    /// `Float64`.
    Float(f64),
    /// `Pointer`: an untyped opaque handle.
    Ptr(RawHandle),
    /// `String`.
    Str(String),
    /// `FunctionRef`.
    Func(FuncRef),
    /// `Vector`: homogeneous by construction on the wire.
    Vec(Vec<Value>),
    /// A registered extension kind.
    Ext(ExtValue),
}

impl Value {
    /// The wire code this value encodes to.
    #[must_use]
    pub fn type_code(&self) -> TypeCode {
        match self {
            Self::Int(_) => TypeCode::INT64,
            Self::Float(_) => TypeCode::FLOAT64,
            Self::Ptr(_) => TypeCode::POINTER,
            Self::Str(_) => TypeCode::STRING,
            Self::Func(_) => TypeCode::FUNCTION_REF,
            Self::Vec(_) => TypeCode::VECTOR,
            Self::Ext(ext) => ext.type_code,
        }
    }

    /// Short description used in mismatch errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Int(v) => format!("Int64({v})"),
            Self::Float(v) => format!("Float64({v})"),
            Self::Ptr(h) => format!("Pointer({h})"),
            Self::Str(s) => format!("String({} bytes)", s.len()),
            Self::Func(f) => format!("FunctionRef({})", f.handle()),
            Self::Vec(items) => format!("Vector(len {})", items.len()),
            Self::Ext(ext) => format!("Extension({}, {})", ext.type_code.0, ext.handle),
        }
    }

    /// Convert into a typed native value.
    ///
    /// # Errors
    ///
    /// Returns [`CtiError::TypeMismatch`] if the value is of another kind.
    pub fn into_typed<T: FromValue>(self) -> CtiResult<T> {
        T::from_value(self)
    }

    /// The integer payload, if this is an `Int64`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                #[inline]
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

value_from_int!(i64, i32, i16, i8, u32, u16, u8);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<RawHandle> for Value {
    fn from(v: RawHandle) -> Self {
        Value::Ptr(v)
    }
}

impl From<FuncRef> for Value {
    fn from(v: FuncRef) -> Self {
        Value::Func(v)
    }
}

impl From<ExtValue> for Value {
    fn from(v: ExtValue) -> Self {
        Value::Ext(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Vec(v.into_iter().map(Into::into).collect())
    }
}

/// Conversion out of a decoded [`Value`].
pub trait FromValue: Sized {
    /// Convert, failing if the value is of another kind.
    ///
    /// # Errors
    ///
    /// Returns [`CtiError::TypeMismatch`] on a kind or range mismatch.
    fn from_value(value: Value) -> CtiResult<Self>;
}

fn mismatch(expected: &'static str, found: &Value) -> CtiError {
    CtiError::TypeMismatch {
        expected,
        found: found.describe(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> CtiResult<Self> {
        Ok(value)
    }
}

impl FromValue for () {
    fn from_value(_: Value) -> CtiResult<Self> {
        Ok(())
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> CtiResult<Self> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(mismatch("Int64", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> CtiResult<Self> {
        match value {
            Value::Int(v) => i32::try_from(v).map_err(|_| mismatch("i32", &Value::Int(v))),
            other => Err(mismatch("i32", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> CtiResult<Self> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(mismatch("Float64", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> CtiResult<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl FromValue for FuncRef {
    fn from_value(value: Value) -> CtiResult<Self> {
        match value {
            Value::Func(f) => Ok(f),
            other => Err(mismatch("FunctionRef", &other)),
        }
    }
}

impl FromValue for ExtValue {
    fn from_value(value: Value) -> CtiResult<Self> {
        match value {
            Value::Ext(ext) => Ok(ext),
            other => Err(mismatch("Extension", &other)),
        }
    }
}

impl FromValue for RawHandle {
    fn from_value(value: Value) -> CtiResult<Self> {
        match value {
            Value::Ptr(h) => Ok(h),
            Value::Ext(ext) => Ok(ext.handle),
            other => Err(mismatch("Pointer", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> CtiResult<Self> {
        match value {
            Value::Vec(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("Vector", &other)),
        }
    }
}
