//! Self-recursive condition trees nested far past serde_json's default
//! recursion limit, taken from text through every core walk.

use p1authz_core::{apply_defaults, host, shapes, validate, Registry, Ty, Value};
use serde_json::Value as Json;

const ENV: &str = "8c6e0b4a-5d2f-4f1e-9a3b-2c7d8e9f0a1b";
const DEPTH: usize = 300;

/// A condition definition whose body is `DEPTH` NOTs around `innermost`.
fn nested_condition(innermost: &str) -> String {
    format!(
        "{{\"environment_id\":\"{}\",\"name\":\"deep\",\"condition\":{}{}{}}}",
        ENV,
        "{\"type\":\"NOT\",\"condition\":".repeat(DEPTH),
        innermost,
        "}".repeat(DEPTH)
    )
}

fn decode(text: &str) -> Value {
    let json = host::parse(text).unwrap();
    host::from_json(Registry::global(), &Ty::object(shapes::CONDITION_DEFINITION), &json).unwrap()
}

#[test]
fn plain_serde_json_refuses_the_input() {
    let text = nested_condition("{\"type\":\"EMPTY\"}");
    assert!(serde_json::from_str::<Json>(&text).is_err());
    assert!(host::parse(&text).is_ok());
}

#[test]
fn deep_condition_decodes_validates_and_encodes() {
    let mut value = decode(&nested_condition("{\"type\":\"EMPTY\"}"));
    apply_defaults(Registry::global(), &mut value).unwrap();
    assert!(validate(Registry::global(), &value).is_empty());

    let encoded = host::to_json(&value);
    let mut node = &encoded["condition"];
    for _ in 0..DEPTH {
        assert_eq!(node["type"], "NOT");
        node = &node["condition"];
    }
    assert_eq!(node["type"], "EMPTY");

    let text = serde_json::to_string(&encoded).unwrap();
    assert_eq!(decode(&text), value);
}

#[test]
fn violation_at_the_bottom_carries_the_full_path() {
    let value = decode(&nested_condition("{\"type\":\"NOT\"}"));
    let errors = validate(Registry::global(), &value);
    assert_eq!(errors.len(), 1);
    let expected = format!(
        "{}: must be set when type is \"NOT\"",
        vec!["condition"; DEPTH + 2].join(".")
    );
    assert_eq!(errors[0].to_string(), expected);
}

#[test]
fn type_mismatch_at_the_bottom_is_reported() {
    let err = host::from_json(
        Registry::global(),
        &Ty::object(shapes::CONDITION_DEFINITION),
        &host::parse(&nested_condition("{\"type\":7}")).unwrap(),
    )
    .unwrap_err();
    assert!(err.to_string().ends_with("condition.type: expected string, found number"));
}
