//! The three raw entry points exported by a foreign runtime.
//!
//! These signatures are fixed by the foreign library. Locating and loading
//! that library is the host's concern; this module only describes the
//! shape of what it hands over.

use std::ffi::{c_char, c_int, c_void};

use crate::wire::PackedValue;

/// Status returned by every entry point on success.
pub const CTI_SUCCESS: c_int = 0;

/// Registry category under which callable functions are published.
pub const PACKED_FUNC_TAG: &str = "PackedFunc";

/// `CTIRegistryListNames(tag, out size, out names)`.
///
/// The returned array and strings are owned by the foreign side and remain
/// valid until the next call on the same thread.
pub type ListNamesFn = unsafe extern "C" fn(
    tag: *const c_char,
    ret_size: *mut c_int,
    ret_names: *mut *const *const c_char,
) -> c_int;

/// `CTIRegistryGet(tag, name, out handle)`.
///
/// A successful status with a null handle means the name is absent.
pub type GetFn = unsafe extern "C" fn(
    tag: *const c_char,
    name: *const c_char,
    ret_handle: *mut *const c_void,
) -> c_int;

/// `CTIPackedFuncCall(handle, num_args, codes, values, out code, out value)`.
pub type PackedFuncCallFn = unsafe extern "C" fn(
    handle: *const c_void,
    num_args: c_int,
    type_codes: *const u32,
    values: *const PackedValue,
    ret_type: *mut u32,
    ret_val: *mut PackedValue,
) -> c_int;

/// Entry points resolved from a foreign library.
#[derive(Debug, Clone, Copy)]
pub struct AbiTable {
    /// `CTIRegistryListNames`.
    pub list_names: ListNamesFn,
    /// `CTIRegistryGet`.
    pub get: GetFn,
    /// `CTIPackedFuncCall`.
    pub call: PackedFuncCallFn,
}
