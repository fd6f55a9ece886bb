//! Calls across the raw ABI into the in-process foreign runtime.

#![allow(unsafe_code)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use cti_sdk::{CtiError, FuncRef, Value, args, packed_call};
use cti_sys::{BoundaryError, PACKED_FUNC_TAG, TypeCode};
use cti_test::foreign::{self, STATUS_BAD_ARGS, STATUS_CALLEE_ERROR};

#[test]
fn test_hello_adds_integers() {
    let lib = common::lib();
    let hello = lib.function("hello").unwrap();
    assert_eq!(hello.call(&args![1, 2]).unwrap(), Value::Int(3));
    assert_eq!(hello.call_as::<i64>(&args![-10, 4]).unwrap(), -6);
}

#[test]
fn test_append_str_concatenates() {
    let lib = common::lib();
    let append = lib.function("append_str").unwrap();
    let out = packed_call!(append, "hello", "world").unwrap();
    assert_eq!(out, Value::from("helloworld"));
}

#[test]
fn test_function_reference_argument() {
    let lib = common::lib();
    let append = lib.function("append_str").unwrap();
    let indirect = lib.function("test_append_str").unwrap();
    let out: String = indirect
        .call_as(&args![&append, "hello", "world"])
        .unwrap();
    assert_eq!(out, "helloworld");
}

#[test]
fn test_vector_add_nested() {
    let lib = common::lib();
    let f = lib.function("vector_add").unwrap();
    let out: Vec<Vec<i64>> = f
        .call_as(&args![vec![vec![1, 2, 3], vec![4]], vec![1, 2, 3, 4]])
        .unwrap();
    assert_eq!(out, vec![vec![11, 12, 13], vec![14]]);
}

#[test]
fn test_echo_round_trips() {
    let lib = common::lib();
    let echo = lib.function("echo").unwrap();
    let samples = [
        Value::Int(0),
        Value::Int(i64::MIN),
        Value::Float(-0.0),
        Value::Float(f64::INFINITY),
        Value::from(""),
        Value::from("naïve café ✓"),
        Value::Vec(Vec::new()),
        Value::from(vec![vec![1, 2, 3], vec![4]]),
        Value::from(vec!["a", "bc"]),
    ];
    for v in samples {
        assert_eq!(echo.call(std::slice::from_ref(&v)).unwrap(), v);
    }

    match echo.call(&args![f64::NAN]).unwrap() {
        Value::Float(back) => assert_eq!(back.to_bits(), f64::NAN.to_bits()),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_returned_function_reference_is_callable() {
    let lib = common::lib();
    let echo = lib.function("echo").unwrap();
    let hello = lib.function("hello").unwrap();
    let func: FuncRef = echo.call_as(&args![&hello]).unwrap();
    assert_eq!(func, hello.func_ref());

    // SAFETY: the reference was produced by the same runtime.
    let bound = unsafe { lib.bind(func) };
    assert_eq!(bound.name(), None);
    assert_eq!(bound.call(&args![20, 22]).unwrap(), Value::Int(42));
}

#[test]
fn test_call_dyn() {
    let lib = common::lib();
    let hello = lib.function("hello").unwrap();
    assert_eq!(lib.call_dyn(&hello, &[&1_i64, &2_u8]).unwrap(), Value::Int(3));
}

#[test]
fn test_list_names() {
    let lib = common::lib();
    let names = lib.list_names(PACKED_FUNC_TAG).unwrap();
    for expected in ["hello", "append_str", "test_append_str", "vector_add"] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
}

#[test]
fn test_unknown_name() {
    let lib = common::lib();
    let err = lib.get(PACKED_FUNC_TAG, "does_not_exist").unwrap_err();
    assert!(matches!(err, CtiError::NameNotFound { ref tag, ref name }
        if tag == "PackedFunc" && name == "does_not_exist"));
}

#[test]
fn test_foreign_failure() {
    let lib = common::lib();
    let err = lib.function("fail").unwrap().call(&[]).unwrap_err();
    assert!(matches!(
        err,
        CtiError::BoundaryCallFailed(BoundaryError::CallFailed {
            status: STATUS_CALLEE_ERROR,
            ..
        })
    ));
}

#[test]
fn test_wrong_arity_is_callee_concern() {
    let lib = common::lib();
    let err = lib.function("hello").unwrap().call(&args![1]).unwrap_err();
    assert!(matches!(err, CtiError::BoundaryCallFailed(_)));
}

#[test]
fn test_unregistered_extension_rejected_by_callee() {
    // The foreign side knows Label; code 99 means nothing to it.
    let lib = common::lib();
    let registry = lib.registry().clone();
    registry
        .register(
            TypeCode(99),
            "Stray",
            cti_core::ExtensionHooks::new(|_| None),
        )
        .unwrap();
    let stray = Value::Ext(cti_sdk::ExtValue::new(
        TypeCode(99),
        cti_sdk::RawHandle::from_addr(0x10),
    ));
    let err = lib.function("echo").unwrap().call(&[stray]).unwrap_err();
    assert!(matches!(
        err,
        CtiError::BoundaryCallFailed(BoundaryError::CallFailed {
            status: STATUS_BAD_ARGS,
            ..
        })
    ));
}

static COUNTED: AtomicUsize = AtomicUsize::new(0);

#[test]
fn test_encode_failure_never_reaches_foreign_side() {
    foreign::register("count_calls", |_| {
        COUNTED.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Int(0))
    });
    let lib = common::lib();
    let f = lib.function("count_calls").unwrap();

    let mixed = Value::Vec(vec![Value::Int(1), Value::Int(2), Value::from("x")]);
    let err = f.call(&[mixed]).unwrap_err();
    assert!(matches!(err, CtiError::InconsistentVectorType { index: 2, .. }));
    assert!(matches!(
        f.call(&args!["a\0b"]).unwrap_err(),
        CtiError::InvalidString(_)
    ));
    assert_eq!(COUNTED.load(Ordering::SeqCst), 0);

    f.call(&[]).unwrap();
    assert_eq!(COUNTED.load(Ordering::SeqCst), 1);
}

#[test]
fn test_depth_limit_applies_before_call() {
    let lib = common::lib().with_max_depth(2);
    let echo = lib.function("echo").unwrap();
    assert!(echo.call(&args![vec![vec![1]]]).is_ok());
    let deep = Value::Vec(vec![Value::from(vec![vec![1]])]);
    assert!(matches!(
        echo.call(&[deep]),
        Err(CtiError::NestingTooDeep { limit: 2 })
    ));
}

#[test]
fn test_decode_failure_after_completed_call() {
    // Without Label in the host registry the result cannot be decoded, but
    // the foreign side already created the label.
    let lib = common::bare_lib();
    let err = lib.function("ext_new").unwrap().call(&[]).unwrap_err();
    assert!(matches!(err, CtiError::UnknownTypeCode(TypeCode(32))));
}
