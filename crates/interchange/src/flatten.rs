//! Wire document → value tree.
//!
//! Inverse of [`expand`](crate::expand::expand) with the read-side rules on
//! top: fields outside the realised variant come back as typed Null, empty
//! collections only survive where the prior tree already had them, and
//! host-only fields are carried over from the prior tree.

use p1authz_core::{fill_absent, host, Error, Fields, Registry, Shape, ShapeId, Tri, Ty, Value};
use serde_json::{Map, Value as Json};

use crate::dispatch::wire_variant;

enum Slot<'a> {
    Root,
    Field(&'a str),
    Element,
}

/// A node waiting to be flattened.
struct Job<'a> {
    slot: Slot<'a>,
    ty: &'a Ty,
    wire: Option<&'a Json>,
    prior: Option<&'a Value>,
    default: Option<&'a Json>,
    path: String,
}

enum Frame<'a> {
    Object {
        slot: Slot<'a>,
        shape: &'a Shape,
        jobs: std::vec::IntoIter<Job<'a>>,
        fields: Fields,
    },
    Array {
        slot: Slot<'a>,
        ty: &'a Ty,
        jobs: std::vec::IntoIter<Job<'a>>,
        items: Vec<Value>,
    },
}

enum Step<'a> {
    Done(Slot<'a>, Value),
    Open(Frame<'a>),
}

/// Flatten `wire` as a value of type `ty`.
///
/// `prior` is the host's current tree for the same node (plan or state),
/// if any; it decides how empty collections and host-only fields come
/// back.
pub fn flatten(
    registry: &Registry,
    ty: &Ty,
    wire: &Json,
    prior: Option<&Value>,
) -> Result<Value, Error> {
    let root = Job {
        slot: Slot::Root,
        ty,
        wire: Some(wire),
        prior,
        default: None,
        path: String::new(),
    };
    let mut stack = match open(registry, root)? {
        Step::Done(_, value) => return Ok(value),
        Step::Open(frame) => vec![frame],
    };

    while let Some(top) = stack.last_mut() {
        let next = match top {
            Frame::Object { jobs, .. } | Frame::Array { jobs, .. } => jobs.next(),
        };
        match next {
            Some(job) => match open(registry, job)? {
                Step::Done(slot, value) => deliver(top, slot, value),
                Step::Open(frame) => stack.push(frame),
            },
            None => {
                let Some(frame) = stack.pop() else { break };
                let (slot, value) = close(frame);
                match stack.last_mut() {
                    Some(parent) => deliver(parent, slot, value),
                    None => return Ok(value),
                }
            }
        }
    }
    Err(Error::InvalidValue {
        path: ".".to_string(),
        message: "document ended without a root value".to_string(),
    })
}

fn open<'a>(registry: &'a Registry, job: Job<'a>) -> Result<Step<'a>, Error> {
    let Job {
        slot,
        ty,
        wire,
        prior,
        default,
        path,
    } = job;

    let Some(wire) = wire.filter(|w| !w.is_null()) else {
        return Ok(Step::Done(slot, absent(registry, ty, default)?));
    };
    // `[]` and `{}` only stay empty where the host already had a value.
    let prior_is_null = prior.map_or(true, Value::is_null);
    if prior_is_null && is_empty_container(wire) {
        return Ok(Step::Done(slot, absent(registry, ty, default)?));
    }

    let value = match ty {
        Ty::String => wire.as_str().map(Value::string),
        Ty::Bool => wire.as_bool().map(Value::bool),
        Ty::Float64 => wire.as_f64().map(Value::float64),
        Ty::Int32 => match wire.as_i64() {
            Some(i) => Some(Value::int32(i32::try_from(i).map_err(|_| {
                Error::InvalidValue {
                    path: display(&path),
                    message: format!("{} does not fit in int32", i),
                }
            })?)),
            None => None,
        },
        Ty::Object(shape_id) => {
            let obj = wire.as_object().ok_or_else(|| mismatch(&path, ty, wire))?;
            return open_object(registry, slot, *shape_id, obj, prior, path);
        }
        Ty::List(elem) | Ty::Set(elem) => {
            let arr = wire.as_array().ok_or_else(|| mismatch(&path, ty, wire))?;
            let is_set = matches!(ty, Ty::Set(_));
            let prior_items = prior.and_then(Value::elements).unwrap_or_default();
            let jobs: Vec<Job<'a>> = arr
                .iter()
                .enumerate()
                .map(|(i, item)| Job {
                    slot: Slot::Element,
                    ty: elem.as_ref(),
                    wire: Some(item),
                    // Set elements have no stable position to line up with.
                    prior: if is_set { None } else { prior_items.get(i) },
                    default: None,
                    path: format!("{}[{}]", path, i),
                })
                .collect();
            return Ok(Step::Open(Frame::Array {
                slot,
                ty,
                jobs: jobs.into_iter(),
                items: Vec::with_capacity(arr.len()),
            }));
        }
    };
    match value {
        Some(v) => Ok(Step::Done(slot, v)),
        None => Err(mismatch(&path, ty, wire)),
    }
}

fn open_object<'a>(
    registry: &'a Registry,
    slot: Slot<'a>,
    shape_id: ShapeId,
    obj: &'a Map<String, Json>,
    prior: Option<&'a Value>,
    path: String,
) -> Result<Step<'a>, Error> {
    let shape = registry.shape(shape_id)?;
    let variant = wire_variant(shape, obj)?;
    let prior_fields = prior.and_then(Value::fields);

    let mut fields = Fields::new();
    let mut jobs = Vec::with_capacity(shape.fields.len());
    for field in &shape.fields {
        let prior_child = prior_fields.and_then(|f| f.get(field.name));
        let Some(wire_path) = &field.wire else {
            // Host-only: the server never returns it.
            if let Some(p) = prior_child {
                fields.insert(field.name.to_string(), p.clone());
            }
            continue;
        };
        if !shape.allows(variant, field.name) {
            continue;
        }
        jobs.push(Job {
            slot: Slot::Field(field.name),
            ty: &field.ty,
            wire: lookup(obj, wire_path),
            prior: prior_child,
            default: field.default.as_ref(),
            path: format!("{}.{}", path, field.name),
        });
    }

    if let Some(v) = variant {
        warn_foreign_keys(shape, v.tag, obj);
    }

    Ok(Step::Open(Frame::Object {
        slot,
        shape,
        jobs: jobs.into_iter(),
        fields,
    }))
}

/// Report wire keys owned by fields the realised variant does not allow.
fn warn_foreign_keys(shape: &Shape, tag: &str, obj: &Map<String, Json>) {
    let variant = shape.variant(tag);
    let claimed: Vec<&str> = shape
        .fields
        .iter()
        .filter(|f| shape.allows(variant, f.name))
        .filter_map(|f| f.wire_key())
        .collect();
    for field in &shape.fields {
        let Some(key) = field.wire_key() else { continue };
        if shape.allows(variant, field.name) || claimed.contains(&key) {
            continue;
        }
        if obj.get(key).is_some_and(|v| !v.is_null()) {
            tracing::warn!(
                shape = %shape.id,
                variant = tag,
                field = field.name,
                "server returned a field outside the chosen variant; ignoring it"
            );
        }
    }
}

fn absent(registry: &Registry, ty: &Ty, default: Option<&Json>) -> Result<Value, Error> {
    match default {
        Some(d) => host::from_json(registry, ty, d),
        None => Ok(Value::null(ty)),
    }
}

fn is_empty_container(json: &Json) -> bool {
    match json {
        Json::Array(a) => a.is_empty(),
        Json::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn lookup<'a>(obj: &'a Map<String, Json>, path: &[String]) -> Option<&'a Json> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(obj.get(first)?, |node, key| node.get(key))
}

fn deliver(frame: &mut Frame<'_>, slot: Slot<'_>, value: Value) {
    match (frame, slot) {
        (Frame::Object { fields, .. }, Slot::Field(name)) => {
            fields.insert(name.to_string(), value);
        }
        (Frame::Array { items, .. }, _) => items.push(value),
        (Frame::Object { .. }, _) => {}
    }
}

fn close(frame: Frame<'_>) -> (Slot<'_>, Value) {
    match frame {
        Frame::Object {
            slot,
            shape,
            mut fields,
            ..
        } => {
            fill_absent(shape, &mut fields);
            (slot, Value::Object(shape.id, Tri::Known(fields)))
        }
        Frame::Array { slot, ty, items, .. } => {
            let value = match ty {
                Ty::Set(elem) => Value::Set((**elem).clone(), Tri::Known(items)),
                Ty::List(elem) => Value::List((**elem).clone(), Tri::Known(items)),
                other => Value::null(other),
            };
            (slot, value)
        }
    }
}

fn mismatch(path: &str, ty: &Ty, wire: &Json) -> Error {
    Error::InvalidValue {
        path: display(path),
        message: format!("expected {} from the server, found {}", ty, wire),
    }
}

fn display(path: &str) -> String {
    p1authz_core::error::display_path(path)
}
