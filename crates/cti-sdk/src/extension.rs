//! Extension objects: foreign handles with construct and release semantics.
//!
//! A kind implements [`Extension`] to name its type code and its foreign
//! constructor and destructor, then registers once with
//! [`register_extension`]. [`ExtObject`] tracks ownership of one handle and
//! guarantees the destructor runs at most once.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use cti_core::{
    CtiError, CtiResult, ExtValue, ExtensionHooks, Ownership, RawHandle, TypeCode, TypeRegistry,
    Value,
};
use tracing::{debug, warn};

use crate::library::Lib;

/// Capability contract of an extension kind.
pub trait Extension: Sized + 'static {
    /// Wire code, at or above `TypeCode::EXTENSION_START`.
    const TYPE_CODE: TypeCode;
    /// Registry name.
    const NAME: &'static str;
    /// Foreign function that creates an instance and returns its handle.
    const CONSTRUCTOR: &'static str;
    /// Foreign function that frees an instance given its handle.
    const DESTRUCTOR: &'static str;
    /// Ownership of handles of this kind obtained by decoding.
    const DECODE_OWNERSHIP: Ownership = Ownership::Borrowed;
}

/// Register kind `K` in `registry`, with a probe that recognizes
/// [`ExtObject<K>`] during dynamic encoding.
///
/// # Errors
///
/// Returns `DuplicateTypeCode` or `DuplicateTypeName` on a collision.
pub fn register_extension<K: Extension>(registry: &TypeRegistry) -> CtiResult<()> {
    registry.register(
        K::TYPE_CODE,
        K::NAME,
        ExtensionHooks::new(probe::<K>).with_decode_ownership(K::DECODE_OWNERSHIP),
    )
}

fn probe<K: Extension>(value: &dyn Any) -> Option<RawHandle> {
    value.downcast_ref::<ExtObject<K>>().map(ExtObject::handle)
}

/// Lifecycle state of an [`ExtObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtState {
    /// No foreign instance yet.
    Unconstructed,
    /// This wrapper releases the handle.
    Owned,
    /// Someone else releases the handle.
    Borrowed,
    /// Terminal: the destructor was attempted.
    Released,
}

/// One foreign instance of kind `K`.
///
/// Dropping an owned object releases it. Explicit [`ExtObject::release`]
/// is preferred since it reports destructor failures.
pub struct ExtObject<K: Extension> {
    lib: Lib,
    handle: RawHandle,
    state: ExtState,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Extension> ExtObject<K> {
    /// Create a foreign instance by calling `K::CONSTRUCTOR` with `args`.
    ///
    /// # Errors
    ///
    /// Lookup and call errors of the constructor, or `TypeMismatch` if it
    /// returns anything but a `K` handle.
    pub fn construct(lib: &Lib, args: &[Value]) -> CtiResult<Self> {
        let mut obj = Self::unconstructed(lib);
        obj.construct_in_place(args)?;
        Ok(obj)
    }

    /// Move an unconstructed wrapper to `Owned` by calling `K::CONSTRUCTOR`.
    ///
    /// On failure the wrapper stays `Unconstructed`.
    ///
    /// # Errors
    ///
    /// `UnsupportedValueKind` if the wrapper is not `Unconstructed`,
    /// otherwise the errors of [`ExtObject::construct`].
    pub fn construct_in_place(&mut self, args: &[Value]) -> CtiResult<()> {
        if self.state != ExtState::Unconstructed {
            return Err(CtiError::UnsupportedValueKind(format!(
                "{} object is already {:?}",
                K::NAME,
                self.state
            )));
        }
        let ctor = self.lib.function(K::CONSTRUCTOR)?;
        let ext = expect_kind::<K>(ctor.call(args)?)?;
        self.handle = ext.handle;
        self.state = ExtState::Owned;
        debug!(kind = K::NAME, handle = %ext.handle, "constructed extension object");
        Ok(())
    }

    /// A wrapper with no foreign instance behind it, until
    /// [`ExtObject::construct_in_place`] is called.
    #[must_use]
    pub fn unconstructed(lib: &Lib) -> Self {
        Self {
            lib: lib.clone(),
            handle: RawHandle::NULL,
            state: ExtState::Unconstructed,
            _kind: PhantomData,
        }
    }

    /// Wrap a decoded value of kind `K`.
    ///
    /// The ownership comes from the registry entry for `K`, or
    /// `K::DECODE_OWNERSHIP` if the kind is not registered with this lib.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if `value` is not a `K` handle.
    pub fn from_value(lib: &Lib, value: Value) -> CtiResult<Self> {
        let ext = expect_kind::<K>(value)?;
        let ownership = lib
            .registry()
            .lookup_by_code(K::TYPE_CODE)
            .map_or(K::DECODE_OWNERSHIP, |hooks| hooks.decode_ownership);
        Ok(Self::from_handle(lib, ext.handle, ownership))
    }

    /// Wrap a bare handle with explicit ownership.
    #[must_use]
    pub fn from_handle(lib: &Lib, handle: RawHandle, ownership: Ownership) -> Self {
        Self {
            lib: lib.clone(),
            handle,
            state: match ownership {
                Ownership::Owned => ExtState::Owned,
                Ownership::Borrowed => ExtState::Borrowed,
            },
            _kind: PhantomData,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ExtState {
        self.state
    }

    /// Whether this wrapper will call the destructor.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.state == ExtState::Owned
    }

    /// The bare handle, whatever the state.
    #[must_use]
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// The wire value: the bare handle tagged with `K::TYPE_CODE`.
    ///
    /// Ownership is neither checked nor transferred. Do not encode an
    /// object after releasing it.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Ext(ExtValue::new(K::TYPE_CODE, self.handle))
    }

    /// Call foreign function `name` with this object as first argument.
    ///
    /// # Errors
    ///
    /// `UnsupportedValueKind` if the object is unconstructed or released,
    /// otherwise lookup and call errors.
    pub fn call_method(&self, name: &str, args: &[Value]) -> CtiResult<Value> {
        if matches!(self.state, ExtState::Unconstructed | ExtState::Released) {
            return Err(CtiError::UnsupportedValueKind(format!(
                "{} object is {:?}",
                K::NAME,
                self.state
            )));
        }
        let mut full = Vec::with_capacity(args.len().saturating_add(1));
        full.push(self.to_value());
        full.extend_from_slice(args);
        self.lib.function(name)?.call(&full)
    }

    /// Release the foreign instance if this wrapper owns it.
    ///
    /// A no-op for borrowed, unconstructed and already released objects.
    /// The state becomes `Released` before the destructor runs, so a
    /// failing destructor is not retried.
    ///
    /// # Errors
    ///
    /// Lookup and call errors of `K::DESTRUCTOR`.
    pub fn release(&mut self) -> CtiResult<()> {
        if self.state != ExtState::Owned {
            return Ok(());
        }
        self.state = ExtState::Released;
        let dtor = self.lib.function(K::DESTRUCTOR)?;
        dtor.call(&[self.to_value()])?;
        debug!(kind = K::NAME, handle = %self.handle, "released extension object");
        Ok(())
    }
}

fn expect_kind<K: Extension>(value: Value) -> CtiResult<ExtValue> {
    match value {
        Value::Ext(ext) if ext.type_code == K::TYPE_CODE => Ok(ext),
        other => Err(CtiError::TypeMismatch {
            expected: K::NAME,
            found: other.describe(),
        }),
    }
}

impl<K: Extension> Drop for ExtObject<K> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(kind = K::NAME, handle = %self.handle, error = %e, "failed to release extension object");
        }
    }
}

impl<K: Extension> fmt::Debug for ExtObject<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtObject")
            .field("kind", &K::NAME)
            .field("handle", &self.handle)
            .field("state", &self.state)
            .finish()
    }
}

impl<K: Extension> From<&ExtObject<K>> for Value {
    fn from(obj: &ExtObject<K>) -> Self {
        obj.to_value()
    }
}
