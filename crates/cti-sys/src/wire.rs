//! The packed value wire layout.
//!
//! Every value that crosses the boundary is a `(type_code, payload)` pair.
//! The payload is a C union sized to the largest built-in representation;
//! which field is live is determined solely by the type code.

use std::ffi::{c_char, c_void};
use std::fmt;

/// Kind tag of a packed value.
///
/// Codes `0..=6` are reserved for the built-in kinds. Codes from
/// [`TypeCode::EXTENSION_START`] upward are assigned to extension kinds by
/// whoever registers them.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TypeCode(pub u32);

impl TypeCode {
    /// Never a valid payload kind.
    pub const UNKNOWN: Self = Self(0);
    /// 64-bit signed integer.
    pub const INT64: Self = Self(1);
    /// 64-bit IEEE-754 float.
    pub const FLOAT64: Self = Self(2);
    /// Untyped pointer-sized value.
    pub const POINTER: Self = Self(3);
    /// Null-terminated byte string.
    pub const STRING: Self = Self(4);
    /// Opaque reference to a foreign callable.
    pub const FUNCTION_REF: Self = Self(5);
    /// Homogeneous vector descriptor.
    pub const VECTOR: Self = Self(6);
    /// First code available to extension kinds.
    pub const EXTENSION_START: Self = Self(7);

    /// Built-in codes paired with their canonical names.
    pub const BUILTINS: [(Self, &'static str); 7] = [
        (Self::UNKNOWN, "Unknown"),
        (Self::INT64, "Int64"),
        (Self::FLOAT64, "Float64"),
        (Self::POINTER, "Pointer"),
        (Self::STRING, "String"),
        (Self::FUNCTION_REF, "FunctionRef"),
        (Self::VECTOR, "Vector"),
    ];

    /// Whether this code lies in the reserved built-in range.
    #[must_use]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::EXTENSION_START.0
    }

    /// Canonical name of a built-in code.
    #[must_use]
    pub fn builtin_name(self) -> Option<&'static str> {
        Self::BUILTINS
            .iter()
            .find(|(code, _)| *code == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "ext({})", self.0),
        }
    }
}

impl From<u32> for TypeCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl From<TypeCode> for u32 {
    fn from(code: TypeCode) -> Self {
        code.0
    }
}

/// Opaque pointer-sized handle owned by the foreign side.
///
/// Stored as an address so that values holding it stay `Send` and `Sync`;
/// it is never dereferenced on this side of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawHandle(usize);

impl RawHandle {
    /// The null handle.
    pub const NULL: Self = Self(0);

    /// Wrap a raw pointer.
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// Wrap a raw address.
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// The handle as a raw pointer.
    #[must_use]
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    /// The handle as an address.
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    /// Whether this is the null handle.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Payload of a packed value.
#[repr(C)]
#[derive(Clone, Copy)]
pub union PackedValue {
    /// `Int64` payload.
    pub v_int64: i64,
    /// `Float64` payload.
    pub v_float64: f64,
    /// `Pointer` and extension payload.
    pub v_ptr: *mut c_void,
    /// `String` payload.
    pub v_str: *const c_char,
    /// `FunctionRef` payload.
    pub v_func: *const c_void,
    /// `Vector` payload.
    pub v_vec: *const PackedVector,
}

impl PackedValue {
    /// An all-zero payload.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self { v_int64: 0 }
    }

    /// Payload carrying an integer.
    #[must_use]
    pub const fn int64(v: i64) -> Self {
        Self { v_int64: v }
    }

    /// Payload carrying a float.
    #[must_use]
    pub const fn float64(v: f64) -> Self {
        Self { v_float64: v }
    }

    /// Payload carrying a bare handle.
    #[must_use]
    pub fn handle(h: RawHandle) -> Self {
        Self { v_ptr: h.as_ptr() }
    }

    /// The payload reinterpreted as a bare handle.
    ///
    /// Every field of the union is pointer-sized or 64-bit, so reading the
    /// pointer field never reads uninitialized memory once the value was
    /// constructed through one of the constructors above.
    #[must_use]
    #[allow(unsafe_code)]
    pub fn as_handle(self) -> RawHandle {
        // SAFETY: all constructors initialize at least pointer width.
        RawHandle::from_ptr(unsafe { self.v_ptr })
    }
}

impl Default for PackedValue {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for PackedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedValue {{ v_ptr: {} }}", self.as_handle())
    }
}

/// Vector descriptor referenced by a `Vector` payload.
///
/// `data` points at `size` payloads, all of kind `type_code`. An empty
/// vector carries a null `data` pointer and `TypeCode::UNKNOWN`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PackedVector {
    /// First element payload.
    pub data: *const PackedValue,
    /// Element count.
    pub size: usize,
    /// Kind shared by every element.
    pub type_code: TypeCode,
}

impl PackedVector {
    /// Descriptor of an empty vector.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: std::ptr::null(),
            size: 0,
            type_code: TypeCode::UNKNOWN,
        }
    }
}

/// A tagged value exactly as it appears on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawArg {
    /// Kind of the payload.
    pub type_code: TypeCode,
    /// The payload itself.
    pub value: PackedValue,
}

impl RawArg {
    /// Pair a code with a payload.
    #[must_use]
    pub const fn new(type_code: TypeCode, value: PackedValue) -> Self {
        Self { type_code, value }
    }
}
