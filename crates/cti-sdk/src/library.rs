//! Registry client and shared invocation context.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use cti_config::CtiConfig;
use cti_core::{CtiResult, DEFAULT_MAX_DEPTH, FuncRef, TypeRegistry, Value, classify};
use cti_sys::{Boundary, PACKED_FUNC_TAG};
use tracing::debug;

use crate::extension::{Extension, register_extension};
use crate::function::Function;
use crate::invoke::invoke;

#[derive(Clone)]
pub(crate) struct Context {
    pub(crate) boundary: Arc<dyn Boundary>,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) tag: String,
    pub(crate) max_depth: usize,
}

/// A handle on one foreign runtime.
///
/// Cheap to clone. Every [`Function`] obtained from a `Lib` keeps it alive.
#[derive(Clone)]
pub struct Lib {
    ctx: Arc<Context>,
}

impl Lib {
    /// Connect to `boundary` using the process-wide type registry, the
    /// `"PackedFunc"` registry tag and the default nesting limit.
    #[must_use]
    pub fn new(boundary: Arc<dyn Boundary>) -> Self {
        Self {
            ctx: Arc::new(Context {
                boundary,
                registry: TypeRegistry::global(),
                tag: PACKED_FUNC_TAG.to_owned(),
                max_depth: DEFAULT_MAX_DEPTH,
            }),
        }
    }

    /// Connect to `boundary` with settings taken from `config`.
    #[must_use]
    pub fn from_config(boundary: Arc<dyn Boundary>, config: &CtiConfig) -> Self {
        Self::new(boundary)
            .with_tag(config.registry.tag.clone())
            .with_max_depth(config.codec.max_depth)
    }

    /// Use `registry` instead of the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        Arc::make_mut(&mut self.ctx).registry = registry;
        self
    }

    /// Change the tag searched by [`Lib::function`].
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.ctx).tag = tag.into();
        self
    }

    /// Change the nesting limit for both directions of the codec.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        Arc::make_mut(&mut self.ctx).max_depth = max_depth;
        self
    }

    /// The type registry used for extension kinds.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.ctx.registry
    }

    /// The default registry tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.ctx.tag
    }

    /// Register extension kind `K` in this lib's type registry.
    ///
    /// # Errors
    ///
    /// Fails if the code or name is already taken.
    pub fn register_extension<K: Extension>(&self) -> CtiResult<()> {
        register_extension::<K>(&self.ctx.registry)
    }

    /// Names the foreign side has registered under `tag`.
    ///
    /// # Errors
    ///
    /// Returns `BoundaryCallFailed` if the foreign side reports a failure.
    pub fn list_names(&self, tag: &str) -> CtiResult<Vec<String>> {
        let names = self.ctx.boundary.list_names(tag)?;
        debug!(tag, count = names.len(), "listed registry names");
        Ok(names)
    }

    /// Resolve `name` under `tag`.
    ///
    /// # Errors
    ///
    /// Returns `NameNotFound` if the foreign side has no such name.
    pub fn get(&self, tag: &str, name: &str) -> CtiResult<Function> {
        let handle = self.ctx.boundary.get_handle(tag, name)?;
        debug!(tag, name, %handle, "resolved function");
        Ok(Function::new(
            self.clone(),
            FuncRef::new(handle),
            Some(Arc::from(name)),
        ))
    }

    /// Resolve `name` under the default tag.
    ///
    /// # Errors
    ///
    /// Returns `NameNotFound` if the foreign side has no such name.
    pub fn function(&self, name: &str) -> CtiResult<Function> {
        self.get(&self.ctx.tag, name)
    }

    /// Wrap a function reference the foreign runtime handed out.
    ///
    /// # Safety
    ///
    /// `func` must be a `FunctionRef` returned by this lib's foreign runtime
    /// and still valid there.
    #[must_use]
    pub unsafe fn bind(&self, func: FuncRef) -> Function {
        Function::new(self.clone(), func, None)
    }

    /// Call `func` with already-built values.
    ///
    /// # Errors
    ///
    /// Any encode error (raised before the call), `BoundaryCallFailed`, or
    /// a decode error of the return value.
    pub fn call(&self, func: &Function, args: &[Value]) -> CtiResult<Value> {
        invoke(&self.ctx, func.func_ref(), func.display_name(), args)
    }

    /// Call `func` with dynamically-typed native values.
    ///
    /// Each argument is mapped with [`classify`] before anything is encoded.
    ///
    /// # Errors
    ///
    /// `UnsupportedValueKind` for an argument of no packed kind, otherwise
    /// as [`Lib::call`].
    pub fn call_dyn(&self, func: &Function, args: &[&dyn Any]) -> CtiResult<Value> {
        let values = args
            .iter()
            .map(|arg| classify(*arg, &self.ctx.registry))
            .collect::<CtiResult<Vec<_>>>()?;
        self.call(func, &values)
    }
}

impl fmt::Debug for Lib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lib")
            .field("tag", &self.ctx.tag)
            .field("max_depth", &self.ctx.max_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cti_core::CtiError;
    use cti_test::MockBoundary;

    #[test]
    fn test_function_uses_default_tag() {
        let mock = Arc::new(MockBoundary::new().with_function("hello", 0x10));
        let lib = Lib::new(mock.clone()).with_registry(Arc::new(TypeRegistry::new()));
        let f = lib.function("hello").unwrap();
        assert_eq!(f.name(), Some("hello"));
        assert_eq!(f.func_ref().handle().addr(), 0x10);
        assert_eq!(mock.lookups(), vec![("PackedFunc".to_owned(), "hello".to_owned())]);
    }

    #[test]
    fn test_from_config() {
        let mock = Arc::new(MockBoundary::new().with_function("f", 0x20));
        let mut config = CtiConfig::default();
        config.registry.tag = "Custom".to_owned();
        config.codec.max_depth = 3;
        let lib = Lib::from_config(mock.clone(), &config);
        assert_eq!(lib.tag(), "Custom");
        lib.function("f").unwrap();
        assert_eq!(mock.lookups()[0].0, "Custom");
    }

    #[test]
    fn test_missing_name() {
        let lib = Lib::new(Arc::new(MockBoundary::new()));
        let err = lib.function("does_not_exist").unwrap_err();
        assert!(matches!(err, CtiError::NameNotFound { ref name, .. } if name == "does_not_exist"));
    }

    #[test]
    fn test_encode_failure_issues_no_call() {
        let mock = Arc::new(MockBoundary::new().with_function("f", 0x30));
        let lib = Lib::new(mock.clone()).with_registry(Arc::new(TypeRegistry::new()));
        let f = lib.function("f").unwrap();
        let mixed = Value::Vec(vec![Value::Int(1), Value::from("x")]);
        let err = f.call(&[Value::Int(0), mixed]).unwrap_err();
        assert!(matches!(err, CtiError::InconsistentVectorType { index: 1, .. }));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_call_passes_codes_in_order() {
        let mock = Arc::new(MockBoundary::new().with_function("f", 0x40).with_int_result(9));
        let lib = Lib::new(mock.clone()).with_registry(Arc::new(TypeRegistry::new()));
        let f = lib.function("f").unwrap();
        let out = f.call(&[Value::Int(1), Value::from("s"), Value::Float(0.5)]).unwrap();
        assert_eq!(out, Value::Int(9));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].handle, 0x40);
        assert_eq!(
            calls[0].type_codes,
            vec![cti_sys::TypeCode::INT64, cti_sys::TypeCode::STRING, cti_sys::TypeCode::FLOAT64]
        );
    }

    #[test]
    fn test_call_dyn_classifies_arguments() {
        let mock = Arc::new(MockBoundary::new().with_function("f", 0x50));
        let lib = Lib::new(mock.clone()).with_registry(Arc::new(TypeRegistry::new()));
        let f = lib.function("f").unwrap();
        lib.call_dyn(&f, &[&3_i32, &"text", &vec![1.0_f64]]).unwrap();
        assert_eq!(
            mock.calls()[0].type_codes,
            vec![cti_sys::TypeCode::INT64, cti_sys::TypeCode::STRING, cti_sys::TypeCode::VECTOR]
        );

        let err = lib.call_dyn(&f, &[&()]).unwrap_err();
        assert!(matches!(err, CtiError::UnsupportedValueKind(_)));
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_boundary_failure_surfaces() {
        let mock = Arc::new(MockBoundary::new().with_function("f", 0x60).failing(-1));
        let lib = Lib::new(mock).with_registry(Arc::new(TypeRegistry::new()));
        let f = lib.function("f").unwrap();
        assert!(matches!(
            f.call(&[]).unwrap_err(),
            CtiError::BoundaryCallFailed(_)
        ));
    }
}
