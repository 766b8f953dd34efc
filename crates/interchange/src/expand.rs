//! Value tree → wire document.
//!
//! The walk keeps its own frame stack instead of recursing, so
//! self-recursive families (conditions, processors, policy children) can
//! nest as deep as the host allows.

use p1authz_core::{Error, Registry, Tri, Value};
use serde_json::{Map, Number, Value as Json};

use crate::dispatch::host_variant;

/// Where a finished child goes in its parent.
enum Slot<'a> {
    Root,
    Field(&'a [String]),
    Element,
}

/// One open container.
enum Frame<'a> {
    Object {
        slot: Slot<'a>,
        children: std::vec::IntoIter<(&'a [String], &'a str, &'a Value)>,
        out: Map<String, Json>,
        path: String,
    },
    Array {
        slot: Slot<'a>,
        items: std::slice::Iter<'a, Value>,
        out: Vec<Json>,
        path: String,
    },
}

enum Step<'a> {
    /// The node expanded to a finished document, or to nothing.
    Done(Slot<'a>, Option<Json>),
    Open(Frame<'a>),
}

/// Expand a value tree into its wire document.
///
/// Null and Unknown nodes are left out of the output entirely; a Null or
/// Unknown root expands to JSON `null`.
pub fn expand(registry: &Registry, value: &Value) -> Result<Json, Error> {
    let mut stack = match open(registry, value, Slot::Root, String::new())? {
        Step::Done(_, json) => return Ok(json.unwrap_or(Json::Null)),
        Step::Open(frame) => vec![frame],
    };

    while let Some(top) = stack.last_mut() {
        let next = match top {
            Frame::Object { children, path, .. } => children
                .next()
                .map(|(wire, name, child)| (Slot::Field(wire), child, format!("{}.{}", path, name))),
            Frame::Array { items, out, path, .. } => items
                .next()
                .map(|child| (Slot::Element, child, format!("{}[{}]", path, out.len()))),
        };

        match next {
            Some((slot, child, child_path)) => match open(registry, child, slot, child_path)? {
                Step::Done(slot, json) => deliver(top, slot, json),
                Step::Open(frame) => stack.push(frame),
            },
            None => {
                let Some(frame) = stack.pop() else { break };
                let (slot, json) = close(frame);
                match stack.last_mut() {
                    Some(parent) => deliver(parent, slot, Some(json)),
                    None => return Ok(json),
                }
            }
        }
    }
    Ok(Json::Null)
}

/// Expand a scalar, or open a frame for a container.
fn open<'a>(
    registry: &'a Registry,
    value: &'a Value,
    slot: Slot<'a>,
    path: String,
) -> Result<Step<'a>, Error> {
    if !value.is_known() {
        return Ok(Step::Done(slot, None));
    }
    let json = match value {
        Value::String(Tri::Known(s)) => Json::String(s.clone()),
        Value::Int32(Tri::Known(i)) => Json::from(*i),
        Value::Bool(Tri::Known(b)) => Json::Bool(*b),
        Value::Float64(Tri::Known(f)) => Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| Error::InvalidValue {
                path: display(&path),
                message: format!("{} cannot be sent as a JSON number", f),
            })?,
        Value::Object(shape_id, Tri::Known(fields)) => {
            let shape = registry.shape(*shape_id)?;
            let variant = host_variant(shape, fields)?;
            if let (Some(u), Some(v)) = (&shape.union, variant) {
                for name in &v.required {
                    if !fields.get(*name).is_some_and(Value::is_known) {
                        return Err(Error::InvalidVariantShape {
                            family: u.family.to_string(),
                            variant: v.tag.to_string(),
                            field: name.to_string(),
                        });
                    }
                }
            }

            let mut children = Vec::with_capacity(shape.fields.len());
            for field in &shape.fields {
                let (Some(wire), true) = (&field.wire, field.is_writable()) else {
                    continue;
                };
                let Some(child) = fields.get(field.name).filter(|c| c.is_known()) else {
                    continue;
                };
                if !shape.allows(variant, field.name) {
                    tracing::debug!(
                        shape = %shape.id,
                        variant = variant.map(|v| v.tag),
                        field = field.name,
                        "dropping field outside the chosen variant"
                    );
                    continue;
                }
                children.push((wire.as_slice(), field.name, child));
            }
            return Ok(Step::Open(Frame::Object {
                slot,
                children: children.into_iter(),
                out: Map::new(),
                path,
            }));
        }
        Value::List(_, Tri::Known(items)) | Value::Set(_, Tri::Known(items)) => {
            return Ok(Step::Open(Frame::Array {
                slot,
                items: items.iter(),
                out: Vec::with_capacity(items.len()),
                path,
            }));
        }
        // Null and Unknown were handled above.
        _ => return Ok(Step::Done(slot, None)),
    };
    Ok(Step::Done(slot, Some(json)))
}

fn deliver(frame: &mut Frame<'_>, slot: Slot<'_>, json: Option<Json>) {
    match (frame, slot) {
        (Frame::Object { out, .. }, Slot::Field(wire)) => {
            if let Some(json) = json {
                insert_at(out, wire, json);
            }
        }
        (Frame::Array { out, .. }, _) => out.push(json.unwrap_or(Json::Null)),
        (Frame::Object { .. }, _) => {}
    }
}

fn close(frame: Frame<'_>) -> (Slot<'_>, Json) {
    match frame {
        Frame::Object { slot, out, .. } => (slot, Json::Object(out)),
        Frame::Array { slot, out, .. } => (slot, Json::Array(out)),
    }
}

/// Insert `json` at a possibly nested wire path such as `environment.id`.
fn insert_at(out: &mut Map<String, Json>, wire: &[String], json: Json) {
    let Some((last, parents)) = wire.split_last() else {
        return;
    };
    let mut target = out;
    for key in parents {
        let entry = target
            .entry(key.clone())
            .or_insert_with(|| Json::Object(Map::new()));
        if !entry.is_object() {
            *entry = Json::Object(Map::new());
        }
        let Json::Object(map) = entry else { return };
        target = map;
    }
    target.insert(last.clone(), json);
}

fn display(path: &str) -> String {
    p1authz_core::error::display_path(path)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use p1authz_core::{host, shapes, ErrorKind, Ty};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const ENV: &str = "8c6e0b4a-5d2f-4f1e-9a3b-2c7d8e9f0a1b";

    fn reg() -> &'static Registry {
        Registry::global()
    }

    fn plan(shape: p1authz_core::ShapeId, doc: Json) -> Value {
        host::from_json(reg(), &Ty::object(shape), &doc).unwrap()
    }

    #[test]
    fn envelope_fields_use_nested_wire_paths() {
        let v = plan(
            shapes::RULE,
            json!({
                "environment_id": ENV,
                "id": "r1",
                "version": "v1",
                "name": "Allow",
                "effect_settings": {"type": "UNCONDITIONAL_PERMIT"}
            }),
        );
        assert_eq!(
            expand(reg(), &v).unwrap(),
            json!({
                "environment": {"id": ENV},
                "name": "Allow",
                "effectSettings": {"type": "UNCONDITIONAL_PERMIT"}
            })
        );
    }

    #[test]
    fn null_and_unknown_are_absent_not_zero() {
        let v = plan(
            shapes::SERVICE,
            json!({
                "name": "svc",
                "service_type": "HTTP",
                "value_type": {"type": "JSON"},
                "description": {"$unknown": true},
                "service_settings": {
                    "url": "https://example.com",
                    "verb": "GET",
                    "timeout_milliseconds": null,
                    "maximum_requests_per_second": 0.0,
                    "authentication": {"type": "NONE"}
                }
            }),
        );
        let wire = expand(reg(), &v).unwrap();
        assert!(wire.get("description").is_none());
        assert!(wire["serviceSettings"].get("timeoutMilliseconds").is_none());
        assert_eq!(wire["serviceSettings"]["maximumRequestsPerSecond"], json!(0.0));
        assert_eq!(wire["serviceType"], json!("HTTP"));
    }

    #[test]
    fn sibling_variant_fields_are_dropped() {
        let v = plan(
            shapes::CONDITION,
            json!({
                "type": "NOT",
                "condition": {"type": "EMPTY"},
                "comparator": "EQUALS",
                "left": {"type": "CONSTANT", "value": "a"}
            }),
        );
        assert_eq!(
            expand(reg(), &v).unwrap(),
            json!({"type": "NOT", "condition": {"type": "EMPTY"}})
        );
    }

    #[test]
    fn missing_variant_field_is_invalid_shape() {
        let v = plan(
            shapes::SERVICE,
            json!({
                "name": "svc",
                "service_type": "CONNECTOR",
                "service_settings": {
                    "channel": "AUTHORIZE",
                    "code": "P1_RISK",
                    "capability": "CAPABILITY1",
                    "input_mappings": [{"property": "p1", "type": "INPUT", "value": "input1"}]
                }
            }),
        );
        let err = expand(reg(), &v).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidVariantShape {
                family: "Service".to_string(),
                variant: "CONNECTOR".to_string(),
                field: "value_type".to_string(),
            }
        );
    }

    #[test]
    fn unknown_required_field_is_invalid_shape() {
        let v = plan(
            shapes::COMPARAND,
            json!({"type": "ATTRIBUTE", "id": {"$unknown": true}}),
        );
        assert_eq!(expand(reg(), &v).unwrap_err().kind(), ErrorKind::InvalidVariantShape);
    }

    #[test]
    fn shared_wire_key_follows_the_variant() {
        let reference = plan(
            shapes::PROCESSOR,
            json!({"type": "REFERENCE", "processor_ref": {"id": "p1"}}),
        );
        assert_eq!(
            expand(reg(), &reference).unwrap(),
            json!({"type": "REFERENCE", "processor": {"id": "p1"}})
        );

        let transform = plan(
            shapes::PROCESSOR,
            json!({
                "type": "COLLECTION_TRANSFORM",
                "processor": {"type": "SPEL", "expression": "#this", "value_type": {"type": "STRING"}}
            }),
        );
        assert_eq!(
            expand(reg(), &transform).unwrap()["processor"]["expression"],
            json!("#this")
        );
    }

    #[test]
    fn lists_keep_order() {
        let v = plan(
            shapes::PROCESSOR,
            json!({
                "type": "CHAIN",
                "processors": [
                    {"type": "JSON_PATH", "expression": "$.a", "value_type": {"type": "JSON"}},
                    {"type": "JSON_PATH", "expression": "$.b", "value_type": {"type": "JSON"}}
                ]
            }),
        );
        let wire = expand(reg(), &v).unwrap();
        assert_eq!(wire["processors"][0]["expression"], json!("$.a"));
        assert_eq!(wire["processors"][1]["expression"], json!("$.b"));
    }

    #[test]
    fn host_only_fields_are_never_sent() {
        let v = plan(
            shapes::API_SERVICE_OPERATION,
            json!({
                "environment_id": ENV,
                "api_service_id": ENV,
                "name": "op",
                "methods": ["GET"],
                "paths": [{"type": "EXACT", "pattern": "/x"}]
            }),
        );
        let wire = expand(reg(), &v).unwrap();
        assert!(wire.get("apiServiceId").is_none());
        assert_eq!(wire["methods"], json!(["GET"]));
    }

    #[test]
    fn null_root_expands_to_null() {
        let v = Value::null(&Ty::object(shapes::RULE));
        assert_eq!(expand(reg(), &v).unwrap(), Json::Null);
    }

    #[test]
    fn non_finite_float_rejected() {
        let v = Value::float64(f64::NAN);
        assert_eq!(expand(reg(), &v).unwrap_err().kind(), ErrorKind::InvalidValue);
    }
}
