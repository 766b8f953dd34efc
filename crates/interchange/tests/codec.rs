//! Round-trip and null-discipline tests for the value codec.

use p1authz_core::{apply_defaults, host, shapes, ErrorKind, Registry, ShapeId, Ty, Value};
use p1authz_interchange::{expand, flatten};
use pretty_assertions::assert_eq;
use serde_json::{json, Value as Json};

const ENV: &str = "8c6e0b4a-5d2f-4f1e-9a3b-2c7d8e9f0a1b";

fn reg() -> &'static Registry {
    Registry::global()
}

fn plan(shape: ShapeId, doc: Json) -> Value {
    let mut v = host::from_json(reg(), &Ty::object(shape), &doc).unwrap();
    apply_defaults(reg(), &mut v).unwrap();
    v
}

fn round_trip(v: &Value) -> Value {
    let wire = expand(reg(), v).unwrap();
    flatten(reg(), &v.ty(), &wire, Some(v)).unwrap()
}

/// Merge server-populated fields into an expanded body.
fn respond(mut body: Json, extra: Json) -> Json {
    if let (Some(b), Some(e)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in e {
            b.insert(k.clone(), v.clone());
        }
    }
    body
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn create_attribute_state_has_typed_nulls_and_server_fields() {
    let v = plan(
        shapes::ATTRIBUTE,
        json!({
            "environment_id": ENV,
            "name": "User",
            "value_type": {"type": "JSON"},
            "resolvers": [{"type": "CURRENT_USER_ID"}]
        }),
    );
    let body = expand(reg(), &v).unwrap();
    assert_eq!(
        body,
        json!({
            "environment": {"id": ENV},
            "name": "User",
            "type": "ATTRIBUTE",
            "resolvers": [{"type": "CURRENT_USER_ID"}],
            "valueType": {"type": "JSON"}
        })
    );

    let response = respond(
        body,
        json!({
            "id": "a1",
            "version": "v1",
            "fullName": "PingOne.User",
            "managedEntity": {
                "owner": {"service": {"name": "PingOne"}},
                "restrictions": {"readOnly": true}
            }
        }),
    );
    let state = flatten(reg(), &Ty::object(shapes::ATTRIBUTE), &response, Some(&v)).unwrap();

    assert_eq!(state.get_str("id"), Some("a1"));
    assert_eq!(state.get_str("version"), Some("v1"));
    assert_eq!(state.get_str("full_name"), Some("PingOne.User"));
    assert_eq!(state.get("parent"), Some(&Value::null(&Ty::object(shapes::REFERENCE))));
    assert_eq!(state.get("processor"), Some(&Value::null(&Ty::object(shapes::PROCESSOR))));
    assert_eq!(
        state
            .get_path(&["managed_entity", "owner", "service", "name"])
            .and_then(Value::as_str),
        Some("PingOne")
    );
    assert_eq!(
        state
            .get_path(&["managed_entity", "restrictions", "read_only"])
            .and_then(Value::as_bool),
        Some(true)
    );

    let resolver = &state.get("resolvers").and_then(Value::elements).unwrap()[0];
    assert_eq!(resolver.get_str("type"), Some("CURRENT_USER_ID"));
    for sibling in ["value", "value_ref", "query", "value_type", "condition", "processor", "name"] {
        assert!(resolver.get(sibling).unwrap().is_null(), "{sibling}");
    }
}

#[test]
fn service_none_to_connector_requires_value_type() {
    let connector = json!({
        "environment_id": ENV,
        "name": "risk",
        "service_type": "CONNECTOR",
        "service_settings": {
            "channel": "AUTHORIZE",
            "code": "P1_RISK",
            "capability": "CAPABILITY1",
            "input_mappings": [{"property": "p1", "type": "INPUT", "value": "input1"}]
        }
    });
    let without_value_type = plan(shapes::SERVICE, connector.clone());
    assert_eq!(
        expand(reg(), &without_value_type).unwrap_err().kind(),
        ErrorKind::InvalidVariantShape
    );

    let mut doc = connector;
    doc["value_type"] = json!({"type": "JSON"});
    let v = plan(shapes::SERVICE, doc);
    let body = expand(reg(), &v).unwrap();
    assert_eq!(
        body["serviceSettings"]["inputMappings"],
        json!([{"property": "p1", "type": "INPUT", "value": "input1"}])
    );

    let response = respond(body, json!({"id": "s1", "version": "v2"}));
    let state = flatten(reg(), &Ty::object(shapes::SERVICE), &response, Some(&v)).unwrap();
    assert_eq!(state.get_str("service_type"), Some("CONNECTOR"));
    assert!(state.get("processor").unwrap().is_null());
    assert!(state.get_path(&["service_settings", "url"]).unwrap().is_null());
    assert!(state
        .get_path(&["service_settings", "authentication"])
        .unwrap()
        .is_null());
    let mapping = &state
        .get_path(&["service_settings", "input_mappings"])
        .and_then(Value::elements)
        .unwrap()[0];
    assert_eq!(mapping.get_str("value"), Some("input1"));
    assert!(mapping.get("value_ref").unwrap().is_null());
}

#[test]
fn none_service_flattens_settings_to_null() {
    let v = plan(
        shapes::SERVICE,
        json!({"environment_id": ENV, "name": "noop", "service_type": "NONE"}),
    );
    let body = expand(reg(), &v).unwrap();
    // The server may echo settings of a previous variant.
    let response = respond(
        body,
        json!({
            "id": "s1",
            "version": "v1",
            "valueType": {"type": "JSON"},
            "serviceSettings": {"url": "https://stale.example.com"}
        }),
    );
    let state = flatten(reg(), &Ty::object(shapes::SERVICE), &response, Some(&v)).unwrap();
    assert!(state.get("value_type").unwrap().is_null());
    assert!(state.get("service_settings").unwrap().is_null());
    assert!(state.get("processor").unwrap().is_null());
}

#[test]
fn nested_policy_round_trips() {
    let comparison = json!({
        "type": "COMPARISON",
        "comparator": "EQUALS",
        "left": {"type": "ATTRIBUTE", "id": "attr-1"},
        "right": {"type": "CONSTANT", "value": "gold"}
    });
    let v = plan(
        shapes::POLICY,
        json!({
            "environment_id": ENV,
            "name": "Top",
            "combining_algorithm": {"algorithm": "DENY_UNLESS_PERMIT"},
            "condition": {"type": "OR", "conditions": [comparison, {"type": "NOT", "condition": comparison}]},
            "children": [{
                "type": "POLICY",
                "name": "Level 1",
                "combining_algorithm": {"algorithm": "FIRST_APPLICABLE"},
                "condition": {"type": "NOT", "condition": comparison},
                "children": [{
                    "type": "POLICY",
                    "name": "Level 2",
                    "combining_algorithm": {"algorithm": "PERMIT_OVERRIDES"},
                    "children": [
                        {"type": "RULE", "name": "Level 3", "effect_settings": {"type": "UNCONDITIONAL_PERMIT"}},
                        {"type": "RULE", "value": {"id": "rule-ref"}}
                    ]
                }]
            }]
        }),
    );
    let back = round_trip(&v);
    assert_eq!(back, v);

    // A child without a condition stays Null: the policy child declares no default.
    let level2 = back
        .get("children")
        .and_then(Value::elements)
        .and_then(|c| c[0].get("children"))
        .and_then(Value::elements)
        .map(|c| &c[0])
        .unwrap();
    assert!(level2.get("condition").unwrap().is_null());
}

#[test]
fn rule_without_condition_on_wire_reads_as_empty() {
    let wire = json!({
        "id": "r1",
        "environment": {"id": ENV},
        "version": "v1",
        "name": "r",
        "enabled": true,
        "effectSettings": {"type": "UNCONDITIONAL_DENY"}
    });
    let state = flatten(reg(), &Ty::object(shapes::RULE), &wire, None).unwrap();
    assert_eq!(
        state.get_path(&["condition", "type"]).and_then(Value::as_str),
        Some("EMPTY")
    );
    assert!(state.get_path(&["condition", "conditions"]).unwrap().is_null());
}

// ── Properties ───────────────────────────────────────────────────────

#[test]
fn deep_condition_nesting_survives_both_directions() {
    let depth = 300;
    let mut doc = json!({"type": "EMPTY"});
    for _ in 0..depth {
        doc = json!({"type": "NOT", "condition": doc});
    }
    let v = plan(shapes::CONDITION, doc);
    let wire = expand(reg(), &v).unwrap();

    let mut node = &wire;
    for _ in 0..depth {
        assert_eq!(node["type"], json!("NOT"));
        node = &node["condition"];
    }
    assert_eq!(node, &json!({"type": "EMPTY"}));

    let back = flatten(reg(), &Ty::object(shapes::CONDITION), &wire, Some(&v)).unwrap();
    assert_eq!(back, v);
}

#[test]
fn deep_processor_chain_round_trips() {
    let mut doc = json!({"type": "SPEL", "expression": "#root", "value_type": {"type": "STRING"}});
    for i in 0..150 {
        doc = json!({"type": "CHAIN", "name": format!("p{i}"), "processors": [doc]});
    }
    let v = plan(shapes::PROCESSOR, doc);
    assert_eq!(round_trip(&v), v);
}

#[test]
fn every_variant_nulls_its_siblings() {
    let cases: &[(ShapeId, Json)] = &[
        (shapes::CONDITION, json!({"type": "EMPTY"})),
        (shapes::CONDITION, json!({"type": "REFERENCE", "reference": {"id": "c1"}})),
        (shapes::COMPARAND, json!({"type": "CONSTANT", "value": "x"})),
        (shapes::PROCESSOR, json!({"type": "REFERENCE", "processor": {"id": "p1"}})),
        (shapes::RESOLVER, json!({"type": "USER", "query": {"type": "USER_ID", "userId": "u"}})),
        (shapes::DATA_INPUT, json!({"type": "ATTRIBUTE", "attribute": {"id": "a"}})),
        (shapes::INPUT_MAPPING, json!({"type": "ATTRIBUTE", "property": "p", "value": {"id": "a"}})),
        (shapes::AUTHENTICATION, json!({"type": "BASIC", "name": {"id": "n"}, "password": {"id": "p"}})),
        (shapes::RULE_EFFECT_SETTINGS, json!({"type": "UNCONDITIONAL_PERMIT"})),
        (shapes::POLICY_CHILD, json!({"type": "RULE", "name": "r"})),
    ];
    for (shape_id, wire) in cases {
        let v = flatten(reg(), &Ty::object(*shape_id), wire, None).unwrap();
        let shape = reg().shape(*shape_id).unwrap();
        let tag = v.get_str("type").unwrap();
        let variant = shape.variant(tag).unwrap();
        for name in &variant.conflicting {
            assert!(
                v.get(name).unwrap().is_null(),
                "{}:{} left {} set",
                shape_id,
                tag,
                name
            );
        }
    }
}

#[test]
fn shared_wire_key_reads_into_the_variant_field() {
    let v = flatten(
        reg(),
        &Ty::object(shapes::INPUT_MAPPING),
        &json!({"type": "ATTRIBUTE", "property": "p", "value": {"id": "a"}}),
        None,
    )
    .unwrap();
    assert_eq!(v.get_path(&["value_ref", "id"]).and_then(Value::as_str), Some("a"));
    assert!(v.get("value").unwrap().is_null());
}

#[test]
fn unsupported_nested_variant_fails_the_whole_read() {
    let wire = json!({
        "id": "r1",
        "environment": {"id": ENV},
        "name": "r",
        "effectSettings": {"type": "MAYBE_PERMIT"}
    });
    let err = flatten(reg(), &Ty::object(shapes::RULE), &wire, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedVariant);
}

// ── Empty collections ────────────────────────────────────────────────

fn statement_wire(attributes: Json) -> Json {
    json!({
        "id": "s1",
        "environment": {"id": ENV},
        "name": "s",
        "description": "d",
        "code": "c",
        "appliesTo": "ANY_DECISION",
        "appliesIf": "FINAL_DECISION_MATCHES",
        "payload": "{}",
        "obligatory": false,
        "attributes": attributes
    })
}

#[test]
fn empty_collection_flattens_to_null_when_prior_was_null() {
    let prior = plan(shapes::STATEMENT, json!({"attributes": null}));
    let state = flatten(
        reg(),
        &Ty::object(shapes::STATEMENT),
        &statement_wire(json!([])),
        Some(&prior),
    )
    .unwrap();
    assert!(state.get("attributes").unwrap().is_null());
}

#[test]
fn empty_collection_stays_empty_when_prior_was_empty() {
    let prior = plan(shapes::STATEMENT, json!({"attributes": []}));
    let state = flatten(
        reg(),
        &Ty::object(shapes::STATEMENT),
        &statement_wire(json!([])),
        Some(&prior),
    )
    .unwrap();
    assert_eq!(
        state.get("attributes"),
        Some(&Value::set(Ty::object(shapes::REFERENCE), vec![]))
    );
}

#[test]
fn empty_collection_without_prior_is_null() {
    let state = flatten(
        reg(),
        &Ty::object(shapes::STATEMENT),
        &statement_wire(json!([])),
        None,
    )
    .unwrap();
    assert!(state.get("attributes").unwrap().is_null());
}

#[test]
fn empty_object_follows_the_same_rule() {
    let wire = json!({});
    let shape = Ty::object(shapes::CACHE_SETTINGS);
    let null_prior = Value::null(&shape);
    let empty_prior = Value::object(shapes::CACHE_SETTINGS, [("ttl_seconds", Value::null(&Ty::Int32))]);

    let from_null = flatten(reg(), &shape, &wire, Some(&null_prior)).unwrap();
    assert!(from_null.is_null());
    let from_empty = flatten(reg(), &shape, &wire, Some(&empty_prior)).unwrap();
    assert_eq!(from_empty.get("ttl_seconds"), Some(&Value::null(&Ty::Int32)));
}

#[test]
fn empty_list_with_default_uses_default() {
    let wire = json!({
        "id": "a1",
        "environment": {"id": ENV},
        "name": "User",
        "resolvers": [],
        "valueType": {"type": "STRING"}
    });
    let state = flatten(reg(), &Ty::object(shapes::ATTRIBUTE), &wire, None).unwrap();
    assert_eq!(
        state.get("resolvers"),
        Some(&Value::list(Ty::object(shapes::RESOLVER), vec![]))
    );
}

// ── Scalars, sets and host-only fields ───────────────────────────────

#[test]
fn float_zero_is_known_and_int32_is_range_checked() {
    let settings = Ty::object(shapes::SERVICE_SETTINGS);
    let v = flatten(
        reg(),
        &settings,
        &json!({"maximumRequestsPerSecond": 0.0, "timeoutMilliseconds": 3000}),
        None,
    )
    .unwrap();
    assert_eq!(v.get("maximum_requests_per_second"), Some(&Value::float64(0.0)));
    assert_eq!(v.get("timeout_milliseconds"), Some(&Value::int32(3000)));

    let err = flatten(reg(), &settings, &json!({"timeoutMilliseconds": 3_000_000_000u64}), None)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "timeout_milliseconds: 3000000000 does not fit in int32"
    );
}

#[test]
fn reordered_sets_compare_equal_and_host_only_fields_survive() {
    let v = plan(
        shapes::API_SERVICE_OPERATION,
        json!({
            "environment_id": ENV,
            "api_service_id": ENV,
            "name": "op",
            "methods": ["GET", "POST"],
            "paths": [{"type": "EXACT", "pattern": "/a"}, {"type": "PARAMETER", "pattern": "/b/{id}"}]
        }),
    );
    let wire = json!({
        "id": "op1",
        "environment": {"id": ENV},
        "name": "op",
        "methods": ["POST", "GET"],
        "paths": [{"type": "PARAMETER", "pattern": "/b/{id}"}, {"type": "EXACT", "pattern": "/a"}]
    });
    let state = flatten(reg(), &v.ty(), &wire, Some(&v)).unwrap();
    assert_eq!(state.get_str("api_service_id"), Some(ENV));
    assert_eq!(state.get("methods"), v.get("methods"));
    assert_eq!(state.get("paths"), v.get("paths"));
}

#[test]
fn fields_outside_the_variant_are_ignored_on_read() {
    let v = flatten(
        reg(),
        &Ty::object(shapes::PROCESSOR),
        &json!({
            "type": "JSON_PATH",
            "expression": "$.x",
            "valueType": {"type": "JSON"},
            "processors": [{"type": "SPEL", "expression": "y", "valueType": {"type": "JSON"}}]
        }),
        None,
    )
    .unwrap();
    assert_eq!(v.get_str("expression"), Some("$.x"));
    assert!(v.get("processors").unwrap().is_null());
}
