//! Integration tests for the object type registry used by the fixtures.

mod helpers;

use helpers::types;
use workflow_compiler::ir::Literal;
use workflow_compiler::{TypeRegistry, TypeResolver};

#[test]
fn fixture_types_load() {
    let types = types();
    let vpc = types.object("Aws::Vpc").expect("Aws::Vpc");
    assert_eq!(vpc.attributes.len(), 8);
    assert_eq!(vpc.attributes["tags"].to_string(), "Hash[String, String]");
    assert!(types.object("Aws::Nope").is_none());
}

#[test]
fn object_attributes_resolve() {
    let types = types();
    let ns = types.resolve("Kubernetes::Namespace").expect("Should resolve");
    assert!(types.is_object(&ns));
    let meta = types.attribute(&ns, "metadata").expect("metadata");
    assert_eq!(meta.name(), "Kubernetes::ObjectMeta");
    assert!(types.attribute(&ns, "labels").is_none());

    let string = types.resolve("String").unwrap();
    assert!(!types.is_object(&string));
}

#[test]
fn enum_values_are_checked() {
    let types = types();
    let state = types.resolve("Enum['pending', 'available']").unwrap();
    assert!(types.check_compatible(&Literal::string("available"), &state).is_ok());
    let err = types
        .check_compatible(&Literal::string("gone"), &state)
        .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"expected a value of type Enum['pending', 'available'], got String 'gone'");
}

#[test]
fn dangling_attribute_type_is_rejected() {
    let err = TypeRegistry::from_json(r#"{"A": {"attributes": {"x": "Nope"}}}"#).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"attribute 'x' of A: Reference to unresolved type 'Nope'");
}
