//! Extension objects against the in-process runtime's `Label` kind.

mod common;

use common::{Label, OwnedLabel};
use cti_sdk::{ExtObject, ExtState, Value, args};
use cti_test::foreign;

#[test]
fn test_construct_release_twice_destructs_once() {
    let lib = common::lib();
    let mut label = ExtObject::<Label>::construct(&lib, &[]).unwrap();
    let handle = label.handle();
    assert_eq!(label.state(), ExtState::Owned);
    assert!(foreign::is_live(handle));

    let text = label.call_method("ext_get", &[]).unwrap();
    assert_eq!(text, Value::from("run"));

    label.release().unwrap();
    label.release().unwrap();
    assert_eq!(label.state(), ExtState::Released);
    drop(label);

    assert_eq!(foreign::release_count(handle), 1);
    assert!(!foreign::is_live(handle));
}

#[test]
fn test_drop_releases_owned_object_once() {
    let lib = common::lib();
    let handle = {
        let label = ExtObject::<Label>::construct(&lib, &args!["scoped"]).unwrap();
        assert_eq!(
            label.call_method("ext_get", &[]).unwrap(),
            Value::from("scoped")
        );
        label.handle()
    };
    assert_eq!(foreign::release_count(handle), 1);
}

#[test]
fn test_returned_handle_is_borrowed() {
    let lib = common::lib();
    let owner = ExtObject::<Label>::construct(&lib, &[]).unwrap();

    let returned = owner.call_method("ext_transform", &[]).unwrap();
    let view = ExtObject::<Label>::from_value(&lib, returned).unwrap();
    assert_eq!(view.state(), ExtState::Borrowed);
    assert_eq!(view.handle(), owner.handle());
    drop(view);

    assert_eq!(foreign::release_count(owner.handle()), 0);
    assert_eq!(
        owner.call_method("ext_get", &[]).unwrap(),
        Value::from("run!")
    );

    let handle = owner.handle();
    drop(owner);
    assert_eq!(foreign::release_count(handle), 1);
}

#[test]
fn test_decode_ownership_follows_registration() {
    let lib = common::lib_with::<OwnedLabel>();
    let created = lib.function("ext_new").unwrap().call(&[]).unwrap();
    let label = ExtObject::<OwnedLabel>::from_value(&lib, created).unwrap();
    assert_eq!(label.state(), ExtState::Owned);
    let handle = label.handle();
    drop(label);
    assert_eq!(foreign::release_count(handle), 1);
}

#[test]
fn test_unconstructed_release_is_noop() {
    let lib = common::lib();
    let mut label = ExtObject::<Label>::unconstructed(&lib);
    label.release().unwrap();
    assert_eq!(label.state(), ExtState::Unconstructed);
}

#[test]
fn test_object_classifies_as_its_kind() {
    let lib = common::lib();
    let label = ExtObject::<Label>::construct(&lib, &args!["dyn"]).unwrap();
    let get = lib.function("ext_get").unwrap();
    assert_eq!(lib.call_dyn(&get, &[&label]).unwrap(), Value::from("dyn"));
    assert_eq!(get.call(&[Value::from(&label)]).unwrap(), Value::from("dyn"));
}
