//! Serializable description of the registry, for hosts that render or
//! inspect the schema.

use serde::Serialize;

use crate::constraint::{Constraint, PathRef};
use crate::entity::{DeleteMode, EntityKind};
use crate::error::Error;
use crate::registry::{FieldMode, Registry, Shape};

#[derive(Debug, Clone, Serialize)]
pub struct CatalogSchema {
    pub entities: Vec<EntitySchema>,
    pub shapes: Vec<ShapeSchema>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySchema {
    pub name: &'static str,
    pub shape: &'static str,
    pub collection: &'static str,
    pub import_format: String,
    pub delete: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub singleton: bool,
    pub id_field: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub listed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub replace_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapeSchema {
    pub id: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantSchema>,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantSchema {
    pub tag: &'static str,
    pub required: Vec<&'static str>,
    pub optional: Vec<&'static str>,
    pub conflicting: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    /// Dotted wire path; absent for URL parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wire: Option<String>,
    #[serde(rename = "type")]
    pub ty: String,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

pub fn describe(registry: &Registry) -> CatalogSchema {
    CatalogSchema {
        entities: registry.entities().map(describe_entity).collect(),
        shapes: registry.shapes().map(describe_shape).collect(),
    }
}

/// One entity kind plus every shape reachable from it.
pub fn describe_kind(registry: &Registry, name: &str) -> Result<CatalogSchema, Error> {
    let kind = registry
        .entity(name)
        .ok_or_else(|| Error::UnknownShape(name.to_string()))?;

    let mut seen = vec![kind.shape];
    let mut next = 0;
    while next < seen.len() {
        let shape = registry.shape(seen[next])?;
        for field in &shape.fields {
            if let Some(target) = object_target(&field.ty) {
                if !seen.contains(&target) {
                    seen.push(target);
                }
            }
        }
        next += 1;
    }

    let shapes = seen
        .into_iter()
        .map(|id| registry.shape(id).map(describe_shape))
        .collect::<Result<_, _>>()?;
    Ok(CatalogSchema {
        entities: vec![describe_entity(kind)],
        shapes,
    })
}

fn object_target(ty: &crate::Ty) -> Option<crate::ShapeId> {
    match ty {
        crate::Ty::Object(s) => Some(*s),
        crate::Ty::List(e) | crate::Ty::Set(e) => object_target(e),
        _ => None,
    }
}

fn describe_entity(kind: &EntityKind) -> EntitySchema {
    EntitySchema {
        name: kind.name,
        shape: kind.shape.as_str(),
        collection: kind.collection,
        import_format: kind.import_format(),
        delete: match kind.delete {
            DeleteMode::Immediate => "immediate",
            DeleteMode::Confirmed => "confirmed",
            DeleteMode::Reset => "reset",
        },
        singleton: kind.singleton,
        id_field: kind.id_field,
        listed: kind.listed,
        replace_only: kind.replace_only,
    }
}

fn describe_shape(shape: &Shape) -> ShapeSchema {
    ShapeSchema {
        id: shape.id.as_str(),
        discriminator: shape.union.as_ref().map(|u| u.discriminator),
        variants: shape
            .union
            .iter()
            .flat_map(|u| &u.variants)
            .map(|v| VariantSchema {
                tag: v.tag,
                required: v.required.clone(),
                optional: v.optional.clone(),
                conflicting: v.conflicting.clone(),
            })
            .collect(),
        fields: shape
            .fields
            .iter()
            .map(|f| FieldSchema {
                name: f.name,
                wire: f.wire.as_ref().map(|p| p.join(".")),
                ty: f.ty.to_string(),
                mode: match f.mode {
                    FieldMode::Required => "required",
                    FieldMode::Optional => "optional",
                    FieldMode::Computed => "computed",
                    FieldMode::OptionalComputed => "optional_computed",
                },
                default: f.default.clone(),
                constraints: f.constraints.iter().map(describe_constraint).collect(),
            })
            .collect(),
    }
}

fn describe_constraint(c: &Constraint) -> String {
    let at = |p: &PathRef| match p {
        PathRef::Root(path) => path.join("."),
        PathRef::Sibling(name) => format!("../{}", name),
    };
    match c {
        Constraint::LengthAtLeast(n) => format!("length >= {}", n),
        Constraint::Matches(re) => format!("matches {}", re),
        Constraint::OneOf(values) => format!("one of {}", values.join("|")),
        Constraint::RequiredIf { path, value } => format!("required if {} = {}", at(path), value),
        Constraint::ConflictsIf { path, value } => {
            format!("conflicts if {} = {}", at(path), value)
        }
        Constraint::ConflictsWith(others) => format!("conflicts with {}", others.join(", ")),
    }
}
