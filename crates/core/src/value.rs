//! The host-side value tree.
//!
//! Every node, scalar or container, carries a [`Tri`] state so that a
//! Null object still knows its shape and an Unknown list still knows its
//! element type. Object types point at registry shapes by [`ShapeId`],
//! which lets self-recursive shapes be described without depth limits.

use std::collections::BTreeMap;
use std::fmt;

/// Name of an object shape registered in the [`Registry`](crate::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub &'static str);

impl ShapeId {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Known / Null / Unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum Tri<T> {
    Known(T),
    Null,
    Unknown,
}

impl<T> Tri<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Tri::Known(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Tri::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Tri::Unknown)
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Tri::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn known_mut(&mut self) -> Option<&mut T> {
        match self {
            Tri::Known(v) => Some(v),
            _ => None,
        }
    }
}

/// Static type of a value-tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    String,
    Int32,
    Float64,
    Bool,
    Object(ShapeId),
    List(Box<Ty>),
    Set(Box<Ty>),
}

impl Ty {
    pub fn object(shape: ShapeId) -> Ty {
        Ty::Object(shape)
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::List(Box::new(elem))
    }

    pub fn set(elem: Ty) -> Ty {
        Ty::Set(Box::new(elem))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Ty::String | Ty::Int32 | Ty::Float64 | Ty::Bool)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::String => f.write_str("string"),
            Ty::Int32 => f.write_str("int32"),
            Ty::Float64 => f.write_str("float64"),
            Ty::Bool => f.write_str("bool"),
            Ty::Object(shape) => write!(f, "object({})", shape),
            Ty::List(elem) => write!(f, "list({})", elem),
            Ty::Set(elem) => write!(f, "set({})", elem),
        }
    }
}

/// Ordered field mapping of an object node.
pub type Fields = BTreeMap<String, Value>;

/// A node of the value tree.
#[derive(Debug, Clone)]
pub enum Value {
    String(Tri<String>),
    Int32(Tri<i32>),
    Float64(Tri<f64>),
    Bool(Tri<bool>),
    Object(ShapeId, Tri<Fields>),
    List(Ty, Tri<Vec<Value>>),
    Set(Ty, Tri<Vec<Value>>),
}

impl Value {
    // ── Constructors ─────────────────────────────────────────────────

    /// Typed Null for `ty`.
    pub fn null(ty: &Ty) -> Value {
        match ty {
            Ty::String => Value::String(Tri::Null),
            Ty::Int32 => Value::Int32(Tri::Null),
            Ty::Float64 => Value::Float64(Tri::Null),
            Ty::Bool => Value::Bool(Tri::Null),
            Ty::Object(shape) => Value::Object(*shape, Tri::Null),
            Ty::List(elem) => Value::List((**elem).clone(), Tri::Null),
            Ty::Set(elem) => Value::Set((**elem).clone(), Tri::Null),
        }
    }

    /// Typed Unknown for `ty`.
    pub fn unknown(ty: &Ty) -> Value {
        match ty {
            Ty::String => Value::String(Tri::Unknown),
            Ty::Int32 => Value::Int32(Tri::Unknown),
            Ty::Float64 => Value::Float64(Tri::Unknown),
            Ty::Bool => Value::Bool(Tri::Unknown),
            Ty::Object(shape) => Value::Object(*shape, Tri::Unknown),
            Ty::List(elem) => Value::List((**elem).clone(), Tri::Unknown),
            Ty::Set(elem) => Value::Set((**elem).clone(), Tri::Unknown),
        }
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Tri::Known(s.into()))
    }

    pub fn int32(i: i32) -> Value {
        Value::Int32(Tri::Known(i))
    }

    pub fn float64(f: f64) -> Value {
        Value::Float64(Tri::Known(f))
    }

    pub fn bool(b: bool) -> Value {
        Value::Bool(Tri::Known(b))
    }

    /// Known object. Fields not listed are simply absent; run the tree
    /// through [`fill_absent`](crate::nulls::fill_absent) to type them.
    pub fn object<I, K>(shape: ShapeId, fields: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Object(
            shape,
            Tri::Known(fields.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        )
    }

    pub fn list(elem: Ty, items: Vec<Value>) -> Value {
        Value::List(elem, Tri::Known(items))
    }

    pub fn set(elem: Ty, items: Vec<Value>) -> Value {
        Value::Set(elem, Tri::Known(items))
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn ty(&self) -> Ty {
        match self {
            Value::String(_) => Ty::String,
            Value::Int32(_) => Ty::Int32,
            Value::Float64(_) => Ty::Float64,
            Value::Bool(_) => Ty::Bool,
            Value::Object(shape, _) => Ty::Object(*shape),
            Value::List(elem, _) => Ty::list(elem.clone()),
            Value::Set(elem, _) => Ty::set(elem.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::String(t) => t.is_null(),
            Value::Int32(t) => t.is_null(),
            Value::Float64(t) => t.is_null(),
            Value::Bool(t) => t.is_null(),
            Value::Object(_, t) => t.is_null(),
            Value::List(_, t) | Value::Set(_, t) => t.is_null(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        match self {
            Value::String(t) => t.is_unknown(),
            Value::Int32(t) => t.is_unknown(),
            Value::Float64(t) => t.is_unknown(),
            Value::Bool(t) => t.is_unknown(),
            Value::Object(_, t) => t.is_unknown(),
            Value::List(_, t) | Value::Set(_, t) => t.is_unknown(),
        }
    }

    pub fn is_known(&self) -> bool {
        !self.is_null() && !self.is_unknown()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(Tri::Known(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(Tri::Known(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(Tri::Known(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(Tri::Known(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn shape(&self) -> Option<ShapeId> {
        match self {
            Value::Object(shape, _) => Some(*shape),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&Fields> {
        match self {
            Value::Object(_, Tri::Known(fields)) => Some(fields),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut Fields> {
        match self {
            Value::Object(_, Tri::Known(fields)) => Some(fields),
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(_, Tri::Known(items)) | Value::Set(_, Tri::Known(items)) => Some(items),
            _ => None,
        }
    }

    /// Field of a Known object.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields().and_then(|f| f.get(name))
    }

    /// Follow a chain of field names through Known objects.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |node, name| node.get(name))
    }

    /// Known string at `name`, if any.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Replace a field of a Known object. Returns false when `self` is not
    /// a Known object.
    pub fn set_field(&mut self, name: &str, value: Value) -> bool {
        match self.fields_mut() {
            Some(fields) => {
                fields.insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }
}

// ── Equality ─────────────────────────────────────────────────────────
//
// Sets compare as multisets; everything else compares structurally.

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Object(sa, a), Value::Object(sb, b)) => sa == sb && a == b,
            (Value::List(ta, a), Value::List(tb, b)) => ta == tb && a == b,
            (Value::Set(ta, a), Value::Set(tb, b)) => {
                ta == tb
                    && match (a, b) {
                        (Tri::Known(a), Tri::Known(b)) => multiset_eq(a, b),
                        (a, b) => a.is_null() == b.is_null() && a.is_unknown() == b.is_unknown(),
                    }
            }
            _ => false,
        }
    }
}

fn multiset_eq(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    'outer: for x in a {
        for (j, y) in b.iter().enumerate() {
            if !used[j] && x == y {
                used[j] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
