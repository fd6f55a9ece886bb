//! The boundary seam between the host and the foreign runtime.

use std::ffi::{CStr, CString, c_char, c_int, c_void};

use tracing::trace;

use crate::abi::{AbiTable, CTI_SUCCESS};
use crate::error::{BoundaryError, BoundaryResult};
use crate::wire::{PackedValue, RawArg, RawHandle, TypeCode};

/// The three operations the core consumes from a foreign runtime.
///
/// Implementations are synchronous: each call blocks until the foreign side
/// returns. There is no timeout and no retry.
pub trait Boundary: Send + Sync {
    /// Names currently registered under `tag`, in the order the foreign
    /// side reports them.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::CallFailed`] if the foreign side reports a
    /// failure status and [`BoundaryError::InvalidCount`] if it reports a
    /// negative count.
    fn list_names(&self, tag: &str) -> BoundaryResult<Vec<String>>;

    /// Resolve `name` under `tag` to a callable handle.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::NameNotFound`] if the foreign side has no
    /// such name.
    fn get_handle(&self, tag: &str, name: &str) -> BoundaryResult<RawHandle>;

    /// Invoke `handle` with a packed argument list and return the single
    /// tagged result.
    ///
    /// `type_codes` and `values` are parallel arrays of the same length.
    /// Pointers inside the returned payload are owned by the foreign side and
    /// stay valid only until the next call on this thread.
    ///
    /// # Safety
    ///
    /// Every pointer reachable from `values` must stay valid for the whole
    /// call, and `handle` must come from [`Boundary::get_handle`] or from a
    /// `FunctionRef` the same foreign runtime returned.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::ArityMismatch`] without crossing if the two
    /// arrays differ in length, and [`BoundaryError::CallFailed`] if the
    /// foreign side signals failure.
    unsafe fn call(
        &self,
        handle: RawHandle,
        type_codes: &[TypeCode],
        values: &[PackedValue],
    ) -> BoundaryResult<RawArg>;
}

/// A [`Boundary`] driven through a raw [`AbiTable`].
#[derive(Debug, Clone, Copy)]
pub struct AbiBoundary {
    table: AbiTable,
}

impl AbiBoundary {
    /// Wrap a table of foreign entry points.
    ///
    /// # Safety
    ///
    /// The function pointers must implement the contracts documented on
    /// [`crate::abi`] and stay callable for the lifetime of this value.
    #[must_use]
    pub unsafe fn new(table: AbiTable) -> Self {
        Self { table }
    }
}

fn c_string(s: &str) -> BoundaryResult<CString> {
    CString::new(s).map_err(|_| BoundaryError::InteriorNul(s.to_owned()))
}

fn check(operation: &'static str, status: c_int) -> BoundaryResult<()> {
    if status == CTI_SUCCESS {
        Ok(())
    } else {
        Err(BoundaryError::CallFailed { operation, status })
    }
}

impl Boundary for AbiBoundary {
    fn list_names(&self, tag: &str) -> BoundaryResult<Vec<String>> {
        let tag_c = c_string(tag)?;
        let mut size: c_int = 0;
        let mut names: *const *const c_char = std::ptr::null();

        // SAFETY: the out-pointers are valid locals; the table contract
        // covers the foreign side.
        let status = unsafe { (self.table.list_names)(tag_c.as_ptr(), &raw mut size, &raw mut names) };
        check("CTIRegistryListNames", status)?;

        let count = usize::try_from(size).map_err(|_| BoundaryError::InvalidCount {
            operation: "CTIRegistryListNames",
            count: size,
        })?;
        trace!(tag, count, "listed registry names");
        if count == 0 || names.is_null() {
            return Ok(Vec::new());
        }

        // SAFETY: the foreign side reported `count` entries at `names`.
        let raw = unsafe { std::slice::from_raw_parts(names, count) };
        raw.iter()
            .map(|&p| {
                if p.is_null() {
                    return Err(BoundaryError::InvalidName);
                }
                // SAFETY: non-null entries are NUL-terminated strings.
                unsafe { CStr::from_ptr(p) }
                    .to_str()
                    .map(str::to_owned)
                    .map_err(|_| BoundaryError::InvalidName)
            })
            .collect()
    }

    fn get_handle(&self, tag: &str, name: &str) -> BoundaryResult<RawHandle> {
        let tag_c = c_string(tag)?;
        let name_c = c_string(name)?;
        let mut handle: *const c_void = std::ptr::null();

        // SAFETY: valid C strings and a valid out-pointer.
        let status = unsafe { (self.table.get)(tag_c.as_ptr(), name_c.as_ptr(), &raw mut handle) };
        check("CTIRegistryGet", status)?;

        if handle.is_null() {
            return Err(BoundaryError::NameNotFound {
                tag: tag.to_owned(),
                name: name.to_owned(),
            });
        }
        trace!(tag, name, handle = %RawHandle::from_ptr(handle), "resolved handle");
        Ok(RawHandle::from_ptr(handle))
    }

    unsafe fn call(
        &self,
        handle: RawHandle,
        type_codes: &[TypeCode],
        values: &[PackedValue],
    ) -> BoundaryResult<RawArg> {
        if type_codes.len() != values.len() {
            return Err(BoundaryError::ArityMismatch {
                codes: type_codes.len(),
                values: values.len(),
            });
        }
        let num_args = c_int::try_from(values.len())
            .map_err(|_| BoundaryError::TooManyArguments(values.len()))?;
        let mut ret_type: u32 = TypeCode::UNKNOWN.0;
        let mut ret_val = PackedValue::zeroed();

        // SAFETY: `TypeCode` is a transparent `u32`; the caller guarantees
        // the argument payloads are live for the duration of the call.
        let status = unsafe {
            (self.table.call)(
                handle.as_ptr(),
                num_args,
                type_codes.as_ptr().cast::<u32>(),
                values.as_ptr(),
                &raw mut ret_type,
                &raw mut ret_val,
            )
        };
        check("CTIPackedFuncCall", status)?;

        trace!(%handle, num_args, ret_type, "boundary call returned");
        Ok(RawArg::new(TypeCode(ret_type), ret_val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn list_two(
        _tag: *const c_char,
        ret_size: *mut c_int,
        ret_names: *mut *const *const c_char,
    ) -> c_int {
        static NAMES: [&CStr; 2] = [c"alpha", c"beta"];
        thread_local! {
            static PTRS: [*const c_char; 2] = [NAMES[0].as_ptr(), NAMES[1].as_ptr()];
        }
        PTRS.with(|p| {
            // SAFETY: out-pointers supplied by the caller.
            unsafe {
                *ret_size = 2;
                *ret_names = p.as_ptr();
            }
        });
        CTI_SUCCESS
    }

    unsafe extern "C" fn get_nothing(
        _tag: *const c_char,
        _name: *const c_char,
        ret_handle: *mut *const c_void,
    ) -> c_int {
        // SAFETY: out-pointer supplied by the caller.
        unsafe { *ret_handle = std::ptr::null() };
        CTI_SUCCESS
    }

    unsafe extern "C" fn call_fails(
        _handle: *const c_void,
        _num_args: c_int,
        _type_codes: *const u32,
        _values: *const PackedValue,
        _ret_type: *mut u32,
        _ret_val: *mut PackedValue,
    ) -> c_int {
        -7
    }

    unsafe extern "C" fn list_negative(
        _tag: *const c_char,
        ret_size: *mut c_int,
        _ret_names: *mut *const *const c_char,
    ) -> c_int {
        // SAFETY: out-pointer supplied by the caller.
        unsafe { *ret_size = -5 };
        CTI_SUCCESS
    }

    static CROSSINGS: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    unsafe extern "C" fn call_counted(
        _handle: *const c_void,
        _num_args: c_int,
        _type_codes: *const u32,
        _values: *const PackedValue,
        _ret_type: *mut u32,
        _ret_val: *mut PackedValue,
    ) -> c_int {
        CROSSINGS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        CTI_SUCCESS
    }

    fn boundary() -> AbiBoundary {
        // SAFETY: the test entry points honour the ABI contract.
        unsafe {
            AbiBoundary::new(AbiTable {
                list_names: list_two,
                get: get_nothing,
                call: call_fails,
            })
        }
    }

    #[test]
    fn test_list_names_copies_foreign_strings() {
        let names = boundary().list_names("PackedFunc").unwrap();
        assert_eq!(names, vec!["alpha".to_owned(), "beta".to_owned()]);
    }

    #[test]
    fn test_null_handle_is_name_not_found() {
        let err = boundary().get_handle("PackedFunc", "missing").unwrap_err();
        assert!(matches!(err, BoundaryError::NameNotFound { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_interior_nul_rejected_before_crossing() {
        let err = boundary().get_handle("Packed\0Func", "x").unwrap_err();
        assert!(matches!(err, BoundaryError::InteriorNul(_)));
    }

    #[test]
    fn test_negative_name_count_is_an_error() {
        // SAFETY: the test entry points honour the ABI contract.
        let b = unsafe {
            AbiBoundary::new(AbiTable {
                list_names: list_negative,
                get: get_nothing,
                call: call_fails,
            })
        };
        let err = b.list_names("PackedFunc").unwrap_err();
        assert!(matches!(
            err,
            BoundaryError::InvalidCount {
                operation: "CTIRegistryListNames",
                count: -5
            }
        ));
    }

    #[test]
    fn test_mismatched_arrays_never_cross() {
        // SAFETY: the test entry points honour the ABI contract.
        let b = unsafe {
            AbiBoundary::new(AbiTable {
                list_names: list_two,
                get: get_nothing,
                call: call_counted,
            })
        };
        let values = [PackedValue::int64(1), PackedValue::int64(2), PackedValue::int64(3)];
        // SAFETY: the payloads are plain integers and the handle is never
        // dereferenced by `call_counted`.
        let err = unsafe { b.call(RawHandle::from_addr(1), &[TypeCode::INT64], &values) }.unwrap_err();
        assert!(matches!(err, BoundaryError::ArityMismatch { codes: 1, values: 3 }));
        assert_eq!(CROSSINGS.load(std::sync::atomic::Ordering::SeqCst), 0);

        let codes = [TypeCode::INT64; 3];
        // SAFETY: as above.
        unsafe { b.call(RawHandle::from_addr(1), &codes, &values) }.unwrap();
        assert_eq!(CROSSINGS.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_status_surfaces() {
        // SAFETY: no arguments, and `call_fails` never touches the handle.
        let err = unsafe { boundary().call(RawHandle::from_addr(1), &[], &[]) }.unwrap_err();
        assert!(matches!(
            err,
            BoundaryError::CallFailed {
                operation: "CTIPackedFuncCall",
                status: -7
            }
        ));
    }
}
