//! Function handles.

use std::fmt;
use std::sync::Arc;

use cti_core::{CtiResult, FromValue, FuncRef, Value};

use crate::library::Lib;

/// A foreign callable, resolved by name or bound from a returned
/// `FunctionRef`.
///
/// Immutable and stateless: every call packs a fresh argument list, so the
/// same handle can be called any number of times.
#[derive(Clone)]
pub struct Function {
    lib: Lib,
    func: FuncRef,
    name: Option<Arc<str>>,
}

impl Function {
    pub(crate) fn new(lib: Lib, func: FuncRef, name: Option<Arc<str>>) -> Self {
        Self { lib, func, name }
    }

    /// Call with already-built values.
    ///
    /// # Errors
    ///
    /// See [`Lib::call`].
    pub fn call(&self, args: &[Value]) -> CtiResult<Value> {
        self.lib.call(self, args)
    }

    /// Call and convert the result.
    ///
    /// # Errors
    ///
    /// See [`Lib::call`]; additionally `TypeMismatch` if the result is of
    /// another kind.
    pub fn call_as<T: FromValue>(&self, args: &[Value]) -> CtiResult<T> {
        self.call(args)?.into_typed()
    }

    /// The registry name, if this handle was resolved by name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<bound>")
    }

    /// The underlying function reference.
    #[must_use]
    pub fn func_ref(&self) -> FuncRef {
        self.func
    }

    /// The lib this handle calls through.
    #[must_use]
    pub fn lib(&self) -> &Lib {
        &self.lib
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.display_name())
            .field("handle", &self.func.handle())
            .finish()
    }
}

impl From<&Function> for Value {
    fn from(f: &Function) -> Self {
        Value::Func(f.func)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Func(f.func)
    }
}
