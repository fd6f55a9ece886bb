//! An in-process foreign runtime.
//!
//! Exposes the three raw entry points as genuine `extern "C"` functions so
//! that [`AbiBoundary`] is driven exactly as it would be against a loaded
//! library. Arguments are decoded and results encoded with the same codec
//! the host uses, against a runtime-side type registry that knows the
//! sample `Label` extension kind.
//!
//! Published functions (all under `"PackedFunc"`):
//!
//! | name | behavior |
//! |---|---|
//! | `hello(a, b)` | `a + b` on integers |
//! | `append_str(a, b)` | string concatenation |
//! | `test_append_str(f, a, b)` | calls function reference `f` with `a, b` |
//! | `vector_add(vv, v)` | adds `sum(v)` to every element of `vv` |
//! | `echo(x)` | returns `x` |
//! | `fail()` | always fails |
//! | `ext_new([text])` | creates a `Label` (default text `"run"`) |
//! | `ext_get(label)` | the label text |
//! | `ext_transform(label)` | appends `"!"`, returns the same label |
//! | `ext_release(label)` | frees the label, counting every attempt |

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use cti_core::{
    CtiError, CtiResult, Decoder, Encoder, ExtValue, ExtensionHooks, RawHandle, TypeCode,
    TypeRegistry, Value,
};
use cti_sys::{AbiBoundary, AbiTable, CTI_SUCCESS, PACKED_FUNC_TAG, PackedValue, RawArg};
use tracing::{debug, warn};

/// Wire code of the sample `Label` extension kind.
pub const LABEL_TYPE_CODE: TypeCode = TypeCode(32);

/// Registry name of the sample `Label` extension kind.
pub const LABEL_TYPE_NAME: &str = "Label";

/// Status for a registry tag other than `"PackedFunc"`.
pub const STATUS_UNKNOWN_TAG: c_int = -1;
/// Status for malformed pointers or arguments that fail to decode.
pub const STATUS_BAD_ARGS: c_int = -2;
/// Status for a function body that returned an error.
pub const STATUS_CALLEE_ERROR: c_int = -3;
/// Status for a handle the runtime never handed out.
pub const STATUS_UNKNOWN_HANDLE: c_int = -4;
/// Status for a return value that cannot be encoded.
pub const STATUS_BAD_RETURN: c_int = -5;

/// Body of a foreign function.
pub type Body = dyn Fn(Vec<Value>) -> CtiResult<Value> + Send + Sync;

struct ForeignFunc {
    name: String,
    body: Box<Body>,
}

/// Published functions. Entries are leaked so their addresses can serve as
/// stable handles for the life of the process.
static FUNCTIONS: LazyLock<Mutex<Vec<&'static ForeignFunc>>> =
    LazyLock::new(|| Mutex::new(samples()));

static TYPES: LazyLock<TypeRegistry> = LazyLock::new(|| {
    let registry = TypeRegistry::new();
    if let Err(e) = registry.register(LABEL_TYPE_CODE, LABEL_TYPE_NAME, ExtensionHooks::new(|_| None)) {
        warn!(error = %e, "foreign runtime could not register Label");
    }
    registry
});

#[derive(Default)]
struct Labels {
    next: usize,
    live: HashMap<usize, String>,
    releases: HashMap<usize, usize>,
}

static LABELS: LazyLock<Mutex<Labels>> = LazyLock::new(|| {
    Mutex::new(Labels {
        next: 0x1000,
        ..Labels::default()
    })
});

#[derive(Default)]
struct NameStore {
    strings: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

thread_local! {
    /// Backing memory for the last `list_names` answer on this thread.
    static NAMES: RefCell<NameStore> = RefCell::new(NameStore::default());
    /// Backing memory for the last call result on this thread.
    static RETURN: RefCell<Option<Encoder<'static>>> = const { RefCell::new(None) };
}

fn functions() -> MutexGuard<'static, Vec<&'static ForeignFunc>> {
    FUNCTIONS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn labels() -> MutexGuard<'static, Labels> {
    LABELS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn leak(name: &str, body: Box<Body>) -> &'static ForeignFunc {
    Box::leak(Box::new(ForeignFunc {
        name: name.to_owned(),
        body,
    }))
}

fn find_by_name(name: &str) -> Option<&'static ForeignFunc> {
    functions().iter().copied().find(|f| f.name == name)
}

fn find_by_handle(handle: RawHandle) -> Option<&'static ForeignFunc> {
    functions()
        .iter()
        .copied()
        .find(|f| std::ptr::addr_eq(std::ptr::from_ref(*f), handle.as_ptr()))
}

/// Publish an extra function. Returns `false` if `name` is taken.
pub fn register<F>(name: &str, body: F) -> bool
where
    F: Fn(Vec<Value>) -> CtiResult<Value> + Send + Sync + 'static,
{
    let mut funcs = functions();
    if funcs.iter().any(|f| f.name == name) {
        return false;
    }
    funcs.push(leak(name, Box::new(body)));
    true
}

/// The raw entry points of this runtime.
#[must_use]
pub fn abi_table() -> AbiTable {
    AbiTable {
        list_names: registry_list_names,
        get: registry_get,
        call: packed_func_call,
    }
}

/// An [`AbiBoundary`] over this runtime.
#[must_use]
pub fn boundary() -> Arc<AbiBoundary> {
    // SAFETY: the entry points below implement the documented contracts
    // and are plain functions, callable for the whole process.
    Arc::new(unsafe { AbiBoundary::new(abi_table()) })
}

/// How many times `ext_release` has been called for `handle`.
#[must_use]
pub fn release_count(handle: RawHandle) -> usize {
    labels().releases.get(&handle.addr()).copied().unwrap_or(0)
}

/// Whether `handle` names a label that has not been released.
#[must_use]
pub fn is_live(handle: RawHandle) -> bool {
    labels().live.contains_key(&handle.addr())
}

fn arity(name: &'static str, args: &[Value], expected: usize) -> CtiResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(CtiError::TypeMismatch {
            expected: name,
            found: format!("{} arguments", args.len()),
        })
    }
}

fn take2(args: Vec<Value>) -> (Value, Value) {
    let mut it = args.into_iter();
    let a = it.next().unwrap_or(Value::Int(0));
    let b = it.next().unwrap_or(Value::Int(0));
    (a, b)
}

fn label_handle(value: &Value) -> CtiResult<usize> {
    match value {
        Value::Ext(ext) if ext.type_code == LABEL_TYPE_CODE => Ok(ext.handle.addr()),
        other => Err(CtiError::TypeMismatch {
            expected: LABEL_TYPE_NAME,
            found: other.describe(),
        }),
    }
}

fn label_value(addr: usize) -> Value {
    Value::Ext(ExtValue::new(LABEL_TYPE_CODE, RawHandle::from_addr(addr)))
}

fn unknown_label(addr: usize) -> CtiError {
    CtiError::UnsupportedValueKind(format!("no live label at {addr:#x}"))
}

/// Call a published function directly, as another foreign function would.
fn call_local(func: RawHandle, args: Vec<Value>) -> CtiResult<Value> {
    let f = find_by_handle(func)
        .ok_or_else(|| CtiError::UnsupportedValueKind(format!("unknown function {func}")))?;
    (f.body)(args)
}

#[allow(clippy::too_many_lines)]
fn samples() -> Vec<&'static ForeignFunc> {
    vec![
        leak(
            "hello",
            Box::new(|args: Vec<Value>| {
                arity("2 arguments", &args, 2)?;
                let (a, b) = take2(args);
                Ok(Value::Int(a.into_typed::<i64>()?.wrapping_add(b.into_typed()?)))
            }),
        ),
        leak(
            "append_str",
            Box::new(|args: Vec<Value>| {
                arity("2 arguments", &args, 2)?;
                let (a, b) = take2(args);
                let mut s: String = a.into_typed()?;
                s.push_str(&b.into_typed::<String>()?);
                Ok(Value::Str(s))
            }),
        ),
        leak(
            "test_append_str",
            Box::new(|args: Vec<Value>| {
                arity("3 arguments", &args, 3)?;
                let mut it = args.into_iter();
                let func = it
                    .next()
                    .map(Value::into_typed::<cti_core::FuncRef>)
                    .transpose()?
                    .ok_or_else(|| CtiError::UnsupportedValueKind("missing function".to_owned()))?;
                call_local(func.handle(), it.collect())
            }),
        ),
        leak(
            "vector_add",
            Box::new(|args: Vec<Value>| {
                arity("2 arguments", &args, 2)?;
                let (vv, v) = take2(args);
                let vv: Vec<Vec<i64>> = vv.into_typed()?;
                let sum = v
                    .into_typed::<Vec<i64>>()?
                    .into_iter()
                    .fold(0_i64, i64::wrapping_add);
                let out: Vec<Vec<i64>> = vv
                    .into_iter()
                    .map(|row| row.into_iter().map(|x| x.wrapping_add(sum)).collect())
                    .collect();
                Ok(Value::from(out))
            }),
        ),
        leak(
            "echo",
            Box::new(|args: Vec<Value>| {
                arity("1 argument", &args, 1)?;
                Ok(args.into_iter().next().unwrap_or(Value::Int(0)))
            }),
        ),
        leak(
            "fail",
            Box::new(|_: Vec<Value>| Err(CtiError::UnsupportedValueKind("fail always fails".to_owned()))),
        ),
        leak(
            "ext_new",
            Box::new(|args: Vec<Value>| {
                let text = match args.into_iter().next() {
                    Some(v) => v.into_typed::<String>()?,
                    None => "run".to_owned(),
                };
                let mut labels = labels();
                let addr = labels.next;
                labels.next = addr.wrapping_add(0x10);
                labels.live.insert(addr, text);
                debug!(handle = addr, "label created");
                Ok(label_value(addr))
            }),
        ),
        leak(
            "ext_get",
            Box::new(|args: Vec<Value>| {
                arity("1 argument", &args, 1)?;
                let addr = label_handle(&args[0])?;
                labels()
                    .live
                    .get(&addr)
                    .cloned()
                    .map(Value::Str)
                    .ok_or_else(|| unknown_label(addr))
            }),
        ),
        leak(
            "ext_transform",
            Box::new(|args: Vec<Value>| {
                arity("1 argument", &args, 1)?;
                let addr = label_handle(&args[0])?;
                let mut labels = labels();
                let text = labels.live.get_mut(&addr).ok_or_else(|| unknown_label(addr))?;
                text.push('!');
                Ok(label_value(addr))
            }),
        ),
        leak(
            "ext_release",
            Box::new(|args: Vec<Value>| {
                arity("1 argument", &args, 1)?;
                let addr = label_handle(&args[0])?;
                let mut labels = labels();
                let count = labels.releases.entry(addr).or_insert(0);
                *count = count.saturating_add(1);
                labels.live.remove(&addr);
                debug!(handle = addr, "label released");
                Ok(Value::Int(0))
            }),
        ),
    ]
}

/// Read a C string argument. `None` for null or non UTF-8.
unsafe fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the entry-point contract.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

unsafe extern "C" fn registry_list_names(
    tag: *const c_char,
    ret_size: *mut c_int,
    ret_names: *mut *const *const c_char,
) -> c_int {
    if ret_size.is_null() || ret_names.is_null() {
        return STATUS_BAD_ARGS;
    }
    // SAFETY: caller passes a C string.
    match unsafe { read_str(tag) } {
        Some(PACKED_FUNC_TAG) => {},
        Some(_) => return STATUS_UNKNOWN_TAG,
        None => return STATUS_BAD_ARGS,
    }

    let strings: Vec<CString> = functions()
        .iter()
        .filter_map(|f| CString::new(f.name.as_str()).ok())
        .collect();
    NAMES.with(|cell| {
        let mut store = cell.borrow_mut();
        store.ptrs = strings.iter().map(|s| s.as_ptr()).collect();
        store.strings = strings;
        // SAFETY: out-pointers checked non-null above.
        unsafe {
            *ret_size = c_int::try_from(store.ptrs.len()).unwrap_or(c_int::MAX);
            *ret_names = store.ptrs.as_ptr();
        }
    });
    CTI_SUCCESS
}

unsafe extern "C" fn registry_get(
    tag: *const c_char,
    name: *const c_char,
    ret_handle: *mut *const c_void,
) -> c_int {
    if ret_handle.is_null() {
        return STATUS_BAD_ARGS;
    }
    // SAFETY: caller passes C strings.
    let (tag, name) = match unsafe { (read_str(tag), read_str(name)) } {
        (Some(t), Some(n)) => (t, n),
        _ => return STATUS_BAD_ARGS,
    };
    if tag != PACKED_FUNC_TAG {
        return STATUS_UNKNOWN_TAG;
    }

    let handle = find_by_name(name).map_or(std::ptr::null(), |f| {
        std::ptr::from_ref::<ForeignFunc>(f).cast::<c_void>()
    });
    // SAFETY: out-pointer checked non-null above.
    unsafe { *ret_handle = handle };
    CTI_SUCCESS
}

unsafe extern "C" fn packed_func_call(
    handle: *const c_void,
    num_args: c_int,
    type_codes: *const u32,
    values: *const PackedValue,
    ret_type: *mut u32,
    ret_val: *mut PackedValue,
) -> c_int {
    if ret_type.is_null() || ret_val.is_null() {
        return STATUS_BAD_ARGS;
    }
    let Some(func) = find_by_handle(RawHandle::from_ptr(handle)) else {
        return STATUS_UNKNOWN_HANDLE;
    };
    let Ok(count) = usize::try_from(num_args) else {
        return STATUS_BAD_ARGS;
    };
    if count > 0 && (type_codes.is_null() || values.is_null()) {
        return STATUS_BAD_ARGS;
    }

    let args = if count == 0 {
        Ok(Vec::new())
    } else {
        // SAFETY: the caller passes `count` codes and payloads.
        let (codes, payloads) = unsafe {
            (
                std::slice::from_raw_parts(type_codes, count),
                std::slice::from_raw_parts(values, count),
            )
        };
        let decoder = Decoder::new(&TYPES);
        codes
            .iter()
            .zip(payloads)
            // SAFETY: payload pointers are kept alive by the caller.
            .map(|(&code, &value)| unsafe { decoder.decode(RawArg::new(TypeCode(code), value)) })
            .collect::<CtiResult<Vec<_>>>()
    };
    let args = match args {
        Ok(a) => a,
        Err(e) => {
            warn!(function = %func.name, error = %e, "foreign side rejected arguments");
            return STATUS_BAD_ARGS;
        },
    };

    let result = match (func.body)(args) {
        Ok(v) => v,
        Err(e) => {
            debug!(function = %func.name, error = %e, "foreign function failed");
            return STATUS_CALLEE_ERROR;
        },
    };

    RETURN.with(|slot| {
        let mut encoder = Encoder::new(&TYPES);
        match encoder.encode(&result) {
            Ok(raw) => {
                *slot.borrow_mut() = Some(encoder);
                // SAFETY: out-pointers checked non-null above.
                unsafe {
                    *ret_type = raw.type_code.0;
                    *ret_val = raw.value;
                }
                CTI_SUCCESS
            },
            Err(e) => {
                warn!(function = %func.name, error = %e, "foreign side could not encode its result");
                STATUS_BAD_RETURN
            },
        }
    })
}
