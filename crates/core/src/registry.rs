//! Type Registry: one description per object shape and per
//! discriminated-union family, consulted by the codec, the dispatcher and
//! the validator alike.
//!
//! The registry is built once and never mutated afterwards; the built-in
//! catalogue is available through [`Registry::global`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::constraint::Constraint;
use crate::entity::EntityKind;
use crate::error::Error;
use crate::value::{ShapeId, Ty};

/// How a field participates in plans and wire documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// Must be set in every plan.
    Required,
    /// May be set; the server echoes what was sent.
    Optional,
    /// Server-owned. Never expanded into requests.
    Computed,
    /// May be set; the server (or a schema default) fills it otherwise.
    OptionalComputed,
}

/// One field of an object shape.
#[derive(Debug, Clone)]
pub struct Field {
    /// Host-side name (snake_case).
    pub name: &'static str,
    /// Path of the field inside the wire document, or `None` for fields that
    /// only exist on the host side (URL parameters).
    pub wire: Option<Vec<String>>,
    pub ty: Ty,
    pub mode: FieldMode,
    /// Host-JSON default applied to Null plan values and to fields the
    /// server leaves out.
    pub default: Option<serde_json::Value>,
    pub constraints: Vec<Constraint>,
}

impl Field {
    fn new(name: &'static str, ty: Ty, mode: FieldMode) -> Self {
        Field {
            name,
            wire: Some(vec![camel_case(name)]),
            ty,
            mode,
            default: None,
            constraints: Vec::new(),
        }
    }

    pub fn required(name: &'static str, ty: Ty) -> Self {
        Field::new(name, ty, FieldMode::Required)
    }

    pub fn optional(name: &'static str, ty: Ty) -> Self {
        Field::new(name, ty, FieldMode::Optional)
    }

    pub fn computed(name: &'static str, ty: Ty) -> Self {
        Field::new(name, ty, FieldMode::Computed)
    }

    pub fn optional_computed(name: &'static str, ty: Ty) -> Self {
        Field::new(name, ty, FieldMode::OptionalComputed)
    }

    /// Override the wire location, e.g. `&["environment", "id"]`.
    pub fn wire(mut self, path: &[&str]) -> Self {
        self.wire = Some(path.iter().map(|s| s.to_string()).collect());
        self
    }

    /// The field never appears in wire documents.
    pub fn host_only(mut self) -> Self {
        self.wire = None;
        self
    }

    pub fn default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn constraint(mut self, c: Constraint) -> Self {
        self.constraints.push(c);
        self
    }

    /// Whether the field is sent in create/update bodies.
    pub fn is_writable(&self) -> bool {
        self.wire.is_some() && self.mode != FieldMode::Computed
    }

    /// First segment of the wire path.
    pub fn wire_key(&self) -> Option<&str> {
        self.wire
            .as_ref()
            .and_then(|p| p.first())
            .map(String::as_str)
    }
}

/// One variant of a union family.
#[derive(Debug, Clone)]
pub struct Variant {
    pub tag: &'static str,
    pub required: Vec<&'static str>,
    pub optional: Vec<&'static str>,
    /// Sibling fields that must be Null when this variant is chosen.
    /// Derived at registration from the family's field list.
    pub conflicting: Vec<&'static str>,
}

impl Variant {
    pub fn new(tag: &'static str) -> Self {
        Variant {
            tag,
            required: Vec::new(),
            optional: Vec::new(),
            conflicting: Vec::new(),
        }
    }

    pub fn required(mut self, fields: &[&'static str]) -> Self {
        self.required.extend_from_slice(fields);
        self
    }

    pub fn optional(mut self, fields: &[&'static str]) -> Self {
        self.optional.extend_from_slice(fields);
        self
    }
}

/// Discriminated-union description attached to a shape.
#[derive(Debug, Clone)]
pub struct Union {
    pub family: &'static str,
    pub discriminator: &'static str,
    /// Fields every variant accepts besides the discriminator.
    pub common: Vec<&'static str>,
    pub variants: Vec<Variant>,
}

/// An object shape: its fields and, for union families, its variants.
#[derive(Debug, Clone)]
pub struct Shape {
    pub id: ShapeId,
    pub fields: Vec<Field>,
    pub union: Option<Union>,
}

impl Shape {
    pub fn object(id: ShapeId, fields: Vec<Field>) -> Self {
        Shape {
            id,
            fields,
            union: None,
        }
    }

    /// A union family keyed by `discriminator`; the family name is the
    /// shape id.
    pub fn union(
        id: ShapeId,
        discriminator: &'static str,
        fields: Vec<Field>,
        variants: Vec<Variant>,
    ) -> Self {
        Shape {
            id,
            fields,
            union: Some(Union {
                family: id.0,
                discriminator,
                common: Vec::new(),
                variants,
            }),
        }
    }

    /// Fields shared by every variant (ignored for plain objects).
    pub fn common(mut self, names: &[&'static str]) -> Self {
        if let Some(u) = self.union.as_mut() {
            u.common.extend_from_slice(names);
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn variant(&self, tag: &str) -> Option<&Variant> {
        self.union
            .as_ref()
            .and_then(|u| u.variants.iter().find(|v| v.tag == tag))
    }

    /// Whether `field` may be set when `variant` is chosen. Plain shapes
    /// accept every field.
    pub fn allows(&self, variant: Option<&Variant>, field: &str) -> bool {
        match (&self.union, variant) {
            (Some(u), Some(v)) => {
                field == u.discriminator
                    || u.common.contains(&field)
                    || v.required.contains(&field)
                    || v.optional.contains(&field)
            }
            _ => true,
        }
    }

    fn finalize(&mut self) {
        let names: Vec<&'static str> = self.fields.iter().map(|f| f.name).collect();
        let Some(u) = self.union.as_mut() else {
            return;
        };
        for v in u.variants.iter_mut() {
            v.conflicting = names
                .iter()
                .copied()
                .filter(|n| {
                    *n != u.discriminator
                        && !u.common.contains(n)
                        && !v.required.contains(n)
                        && !v.optional.contains(n)
                })
                .collect();
        }
    }
}

/// The catalogue of shapes and entity kinds.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    shapes: BTreeMap<ShapeId, Shape>,
    entities: BTreeMap<&'static str, EntityKind>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the built-in trust-framework catalogue.
    pub fn builtin() -> Self {
        let mut registry = Registry::new();
        crate::catalog::register_all(&mut registry);
        registry
    }

    /// Process-wide read-only instance of [`Registry::builtin`].
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::builtin)
    }

    pub fn register(&mut self, mut shape: Shape) {
        shape.finalize();
        self.shapes.insert(shape.id, shape);
    }

    pub fn register_entity(&mut self, kind: EntityKind) {
        self.entities.insert(kind.name, kind);
    }

    pub fn shape(&self, id: ShapeId) -> Result<&Shape, Error> {
        self.shapes
            .get(&id)
            .ok_or_else(|| Error::UnknownShape(id.0.to_string()))
    }

    /// Union family by name.
    pub fn family(&self, name: &str) -> Option<&Shape> {
        self.shapes
            .values()
            .find(|s| s.union.as_ref().is_some_and(|u| u.family == name))
    }

    pub fn families(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values().filter(|s| s.union.is_some())
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    pub fn entity(&self, name: &str) -> Option<&EntityKind> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityKind> {
        self.entities.values()
    }
}

/// `service_settings` → `serviceSettings`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
