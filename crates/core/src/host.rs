//! Host JSON: the file form of plan and state trees.
//!
//! Plain JSON decoded against a type. `null` and missing fields become
//! typed Null; the marker object `{"$unknown": true}` stands for a value
//! the host has not resolved yet.

use std::collections::btree_map;

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use crate::error::Error;
use crate::nulls::fill_absent;
use crate::registry::{Registry, Shape};
use crate::value::{Fields, Tri, Ty, Value};

pub const UNKNOWN_MARKER: &str = "$unknown";

fn is_unknown_marker(json: &Json) -> bool {
    json.as_object().is_some_and(|o| {
        o.len() == 1 && o.get(UNKNOWN_MARKER).and_then(Json::as_bool) == Some(true)
    })
}

/// Parse JSON text with no nesting limit.
///
/// Conditions and processors are self-recursive, so plan files and API
/// bodies can nest past `serde_json`'s default recursion guard.
pub fn parse(text: &str) -> Result<Json, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Json::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

// ── Decoding ─────────────────────────────────────────────────────────

/// One open container while decoding. A finished child goes into its
/// parent under `key`, or is appended when `key` is `None`.
enum Open<'a> {
    Object {
        key: Option<&'a str>,
        shape: &'a Shape,
        entries: serde_json::map::Iter<'a>,
        fields: Fields,
        path: String,
    },
    Array {
        key: Option<&'a str>,
        elem: &'a Ty,
        set: bool,
        items: std::slice::Iter<'a, Json>,
        out: Vec<Value>,
        path: String,
    },
}

enum Decoded<'a> {
    Done(Option<&'a str>, Value),
    Open(Open<'a>),
}

/// Decode host JSON against `ty`.
///
/// Walks with its own frame stack, so nesting depth is bounded by memory
/// rather than by the thread's stack.
pub fn from_json(registry: &Registry, ty: &Ty, json: &Json) -> Result<Value, Error> {
    let mut stack = match decode(registry, ty, json, None, String::new())? {
        Decoded::Done(_, value) => return Ok(value),
        Decoded::Open(frame) => vec![frame],
    };

    while let Some(top) = stack.last_mut() {
        let next = match top {
            Open::Object {
                shape,
                entries,
                path,
                ..
            } => {
                let shape = *shape;
                match entries.next() {
                    Some((key, child)) => {
                        let field = shape.field(key).ok_or_else(|| {
                            Error::invalid(
                                path.as_str(),
                                format!("unsupported attribute \"{}\"", key),
                            )
                        })?;
                        Some((Some(key.as_str()), &field.ty, child, format!("{}.{}", path, key)))
                    }
                    None => None,
                }
            }
            Open::Array {
                elem,
                items,
                out,
                path,
                ..
            } => {
                let elem = *elem;
                items
                    .next()
                    .map(|child| (None, elem, child, format!("{}[{}]", path, out.len())))
            }
        };

        match next {
            Some((key, ty, child, child_path)) => {
                match decode(registry, ty, child, key, child_path)? {
                    Decoded::Done(key, value) => attach(top, key, value),
                    Decoded::Open(frame) => stack.push(frame),
                }
            }
            None => {
                let Some(frame) = stack.pop() else { break };
                let (key, value) = seal(frame);
                match stack.last_mut() {
                    Some(parent) => attach(parent, key, value),
                    None => return Ok(value),
                }
            }
        }
    }
    Ok(Value::null(ty))
}

/// Decode a scalar, or open a frame for a container.
fn decode<'a>(
    registry: &'a Registry,
    ty: &'a Ty,
    json: &'a Json,
    key: Option<&'a str>,
    path: String,
) -> Result<Decoded<'a>, Error> {
    if json.is_null() {
        return Ok(Decoded::Done(key, Value::null(ty)));
    }
    if is_unknown_marker(json) {
        return Ok(Decoded::Done(key, Value::unknown(ty)));
    }
    let scalar = match ty {
        Ty::String => json.as_str().map(Value::string),
        Ty::Int32 => json
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::int32),
        Ty::Float64 => json.as_f64().map(Value::float64),
        Ty::Bool => json.as_bool().map(Value::bool),
        Ty::Object(shape_id) => {
            let obj = json.as_object().ok_or_else(|| mismatch(&path, ty, json))?;
            return Ok(Decoded::Open(Open::Object {
                key,
                shape: registry.shape(*shape_id)?,
                entries: obj.iter(),
                fields: Fields::new(),
                path,
            }));
        }
        Ty::List(elem) | Ty::Set(elem) => {
            let arr = json.as_array().ok_or_else(|| mismatch(&path, ty, json))?;
            return Ok(Decoded::Open(Open::Array {
                key,
                elem: &**elem,
                set: matches!(ty, Ty::Set(_)),
                items: arr.iter(),
                out: Vec::with_capacity(arr.len()),
                path,
            }));
        }
    };
    scalar
        .map(|value| Decoded::Done(key, value))
        .ok_or_else(|| mismatch(&path, ty, json))
}

fn attach(parent: &mut Open<'_>, key: Option<&str>, value: Value) {
    match (parent, key) {
        (Open::Object { fields, .. }, Some(key)) => {
            fields.insert(key.to_string(), value);
        }
        (Open::Array { out, .. }, _) => out.push(value),
        (Open::Object { .. }, None) => {}
    }
}

fn seal<'a>(frame: Open<'a>) -> (Option<&'a str>, Value) {
    match frame {
        Open::Object {
            key,
            shape,
            mut fields,
            ..
        } => {
            fill_absent(shape, &mut fields);
            (key, Value::Object(shape.id, Tri::Known(fields)))
        }
        Open::Array {
            key, elem, set, out, ..
        } => {
            let value = if set {
                Value::set(elem.clone(), out)
            } else {
                Value::list(elem.clone(), out)
            };
            (key, value)
        }
    }
}

fn mismatch(path: &str, ty: &Ty, json: &Json) -> Error {
    let found = match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    };
    Error::invalid(path, format!("expected {}, found {}", ty, found))
}

// ── Encoding ─────────────────────────────────────────────────────────

enum Emit<'a> {
    Object {
        key: Option<&'a str>,
        entries: btree_map::Iter<'a, String, Value>,
        out: Map<String, Json>,
    },
    Array {
        key: Option<&'a str>,
        items: std::slice::Iter<'a, Value>,
        out: Vec<Json>,
    },
}

enum Encoded<'a> {
    Done(Option<&'a str>, Json),
    Open(Emit<'a>),
}

/// Encode a value tree as host JSON. Null fields are written as `null`.
pub fn to_json(value: &Value) -> Json {
    let mut stack = match encode(value, None) {
        Encoded::Done(_, json) => return json,
        Encoded::Open(frame) => vec![frame],
    };

    while let Some(top) = stack.last_mut() {
        let next = match top {
            Emit::Object { entries, .. } => entries.next().map(|(k, v)| (Some(k.as_str()), v)),
            Emit::Array { items, .. } => items.next().map(|v| (None, v)),
        };
        match next {
            Some((key, child)) => match encode(child, key) {
                Encoded::Done(key, json) => emit(top, key, json),
                Encoded::Open(frame) => stack.push(frame),
            },
            None => {
                let Some(frame) = stack.pop() else { break };
                let (key, json) = match frame {
                    Emit::Object { key, out, .. } => (key, Json::Object(out)),
                    Emit::Array { key, out, .. } => (key, Json::Array(out)),
                };
                match stack.last_mut() {
                    Some(parent) => emit(parent, key, json),
                    None => return json,
                }
            }
        }
    }
    Json::Null
}

fn encode<'a>(value: &'a Value, key: Option<&'a str>) -> Encoded<'a> {
    fn leaf<T>(t: &Tri<T>, known: impl FnOnce(&T) -> Json) -> Json {
        match t {
            Tri::Known(v) => known(v),
            Tri::Null => Json::Null,
            Tri::Unknown => unknown_marker(),
        }
    }
    let json = match value {
        Value::String(t) => leaf(t, |s| Json::String(s.clone())),
        Value::Int32(t) => leaf(t, |i| Json::from(*i)),
        Value::Float64(t) => leaf(t, |f| Json::from(*f)),
        Value::Bool(t) => leaf(t, |b| Json::Bool(*b)),
        Value::Object(_, Tri::Known(fields)) => {
            return Encoded::Open(Emit::Object {
                key,
                entries: fields.iter(),
                out: Map::new(),
            })
        }
        Value::List(_, Tri::Known(items)) | Value::Set(_, Tri::Known(items)) => {
            return Encoded::Open(Emit::Array {
                key,
                items: items.iter(),
                out: Vec::with_capacity(items.len()),
            })
        }
        Value::Object(_, t) => leaf(t, |_| Json::Null),
        Value::List(_, t) | Value::Set(_, t) => leaf(t, |_| Json::Null),
    };
    Encoded::Done(key, json)
}

fn emit(parent: &mut Emit<'_>, key: Option<&str>, json: Json) {
    match (parent, key) {
        (Emit::Object { out, .. }, Some(key)) => {
            out.insert(key.to_string(), json);
        }
        (Emit::Array { out, .. }, _) => out.push(json),
        (Emit::Object { .. }, None) => {}
    }
}

fn unknown_marker() -> Json {
    let mut m = Map::new();
    m.insert(UNKNOWN_MARKER.to_string(), Json::Bool(true));
    Json::Object(m)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
