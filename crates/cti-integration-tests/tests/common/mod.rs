//! Shared harness for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use cti_sdk::{Extension, Lib, Ownership, TypeCode, TypeRegistry, register_extension};
use cti_test::foreign::{self, LABEL_TYPE_CODE, LABEL_TYPE_NAME};

/// The sample `Label` kind published by the in-process runtime.
pub struct Label;

impl Extension for Label {
    const TYPE_CODE: TypeCode = LABEL_TYPE_CODE;
    const NAME: &'static str = LABEL_TYPE_NAME;
    const CONSTRUCTOR: &'static str = "ext_new";
    const DESTRUCTOR: &'static str = "ext_release";
}

/// `Label`, but decoded handles are owned by the receiver.
pub struct OwnedLabel;

impl Extension for OwnedLabel {
    const TYPE_CODE: TypeCode = LABEL_TYPE_CODE;
    const NAME: &'static str = LABEL_TYPE_NAME;
    const CONSTRUCTOR: &'static str = "ext_new";
    const DESTRUCTOR: &'static str = "ext_release";
    const DECODE_OWNERSHIP: Ownership = Ownership::Owned;
}

/// A lib over the in-process runtime with its own registry, `K` registered.
pub fn lib_with<K: Extension>() -> Lib {
    cti_test::setup_test_logging("cti_sdk=debug,cti_core=debug,cti_sys=trace");
    let registry = Arc::new(TypeRegistry::new());
    register_extension::<K>(&registry).expect("fresh registry accepts the kind");
    Lib::new(foreign::boundary()).with_registry(registry)
}

/// A lib over the in-process runtime with `Label` registered.
pub fn lib() -> Lib {
    lib_with::<Label>()
}

/// A lib over the in-process runtime whose registry knows no extensions.
pub fn bare_lib() -> Lib {
    cti_test::setup_test_logging("cti_sdk=debug");
    Lib::new(foreign::boundary()).with_registry(Arc::new(TypeRegistry::new()))
}
