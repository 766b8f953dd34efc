//! Built-in catalogue of PingOne Authorize shapes, union families and
//! entity kinds.

mod editor;
mod entities;

use crate::constraint::Constraint;
use crate::registry::{Field, Registry};
use crate::value::Ty;

/// Shape identifiers. Union families use their family name.
pub mod shapes {
    use crate::value::ShapeId;

    // ── Small shared shapes ─────────────────────────────────────────
    pub const REFERENCE: ShapeId = ShapeId("Reference");
    pub const VALUE_TYPE: ShapeId = ShapeId("ValueType");
    pub const MANAGED_ENTITY: ShapeId = ShapeId("ManagedEntity");
    pub const MANAGED_ENTITY_OWNER: ShapeId = ShapeId("ManagedEntityOwner");
    pub const MANAGED_ENTITY_OWNER_SERVICE: ShapeId = ShapeId("ManagedEntityOwnerService");
    pub const MANAGED_ENTITY_REFERENCE: ShapeId = ShapeId("ManagedEntityReference");
    pub const MANAGED_ENTITY_RESTRICTIONS: ShapeId = ShapeId("ManagedEntityRestrictions");
    pub const CACHE_SETTINGS: ShapeId = ShapeId("CacheSettings");
    pub const SERVICE_SETTINGS: ShapeId = ShapeId("ServiceSettings");
    pub const HEADER: ShapeId = ShapeId("Header");
    pub const TLS_SETTINGS: ShapeId = ShapeId("TlsSettings");
    pub const RESOLVER_QUERY: ShapeId = ShapeId("ResolverQuery");
    pub const COMBINING_ALGORITHM: ShapeId = ShapeId("CombiningAlgorithm");
    pub const REPETITION_SETTINGS: ShapeId = ShapeId("RepetitionSettings");

    // ── Union families ──────────────────────────────────────────────
    pub const COMPARAND: ShapeId = ShapeId("Comparand");
    pub const CONDITION: ShapeId = ShapeId("Condition");
    pub const PROCESSOR: ShapeId = ShapeId("Processor");
    pub const RESOLVER: ShapeId = ShapeId("Resolver");
    pub const DATA_INPUT: ShapeId = ShapeId("DataInput");
    pub const INPUT_MAPPING: ShapeId = ShapeId("InputMapping");
    pub const AUTHENTICATION: ShapeId = ShapeId("Authentication");
    pub const RULE_EFFECT_SETTINGS: ShapeId = ShapeId("RuleEffectSettings");
    pub const POLICY_CHILD: ShapeId = ShapeId("PolicyChild");

    // ── Entities ────────────────────────────────────────────────────
    pub const ATTRIBUTE: ShapeId = ShapeId("Attribute");
    pub const CONDITION_DEFINITION: ShapeId = ShapeId("ConditionDefinition");
    pub const PROCESSOR_DEFINITION: ShapeId = ShapeId("ProcessorDefinition");
    /// The Service entity is itself a union on `service_type`.
    pub const SERVICE: ShapeId = ShapeId("Service");
    pub const STATEMENT: ShapeId = ShapeId("Statement");
    pub const RULE: ShapeId = ShapeId("Rule");
    pub const POLICY: ShapeId = ShapeId("Policy");
    pub const ROOT_POLICY: ShapeId = ShapeId("RootPolicy");
    pub const API_SERVICE: ShapeId = ShapeId("ApiService");
    pub const API_SERVICE_OPERATION: ShapeId = ShapeId("ApiServiceOperation");
    pub const APPLICATION_RESOURCE_PERMISSION: ShapeId = ShapeId("ApplicationResourcePermission");
    pub const APPLICATION_ROLE_PERMISSION: ShapeId = ShapeId("ApplicationRolePermission");

    // ── API service parts ───────────────────────────────────────────
    pub const AUTHORIZATION_SERVER: ShapeId = ShapeId("AuthorizationServer");
    pub const DIRECTORY: ShapeId = ShapeId("Directory");
    pub const ACCESS_CONTROL: ShapeId = ShapeId("AccessControl");
    pub const ACCESS_CONTROL_CUSTOM: ShapeId = ShapeId("AccessControlCustom");
    pub const OPERATION_PATH: ShapeId = ShapeId("OperationPath");
    pub const OPERATION_ACCESS_CONTROL: ShapeId = ShapeId("OperationAccessControl");
    pub const OPERATION_ACCESS_GROUP: ShapeId = ShapeId("OperationAccessGroup");
    pub const PERMISSION_RESOURCE: ShapeId = ShapeId("PermissionResource");
}

/// Populate `registry` with every built-in shape and entity kind.
pub fn register_all(registry: &mut Registry) {
    editor::register(registry);
    entities::register(registry);
}

// ── Envelope fields shared by entity shapes ────────────────────────────

const RESOURCE_ID: &str = "^[0-9a-fA-F-]{36}$";

fn id() -> Field {
    Field::computed("id", Ty::String)
}

fn environment_id() -> Field {
    Field::required("environment_id", Ty::String)
        .wire(&["environment", "id"])
        .constraint(Constraint::Matches(RESOURCE_ID))
}

/// A path parameter: part of the URL, never of the body.
fn path_id(name: &'static str) -> Field {
    Field::required(name, Ty::String)
        .host_only()
        .constraint(Constraint::Matches(RESOURCE_ID))
}

fn name() -> Field {
    Field::required("name", Ty::String).constraint(Constraint::LengthAtLeast(1))
}

fn full_name() -> Field {
    Field::computed("full_name", Ty::String)
}

fn description() -> Field {
    Field::optional("description", Ty::String)
}

fn parent() -> Field {
    Field::optional("parent", Ty::object(shapes::REFERENCE))
}

fn version() -> Field {
    Field::computed("version", Ty::String)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::RESOURCE_ID_PATTERN;

    #[test]
    fn anchored_resource_id_matches_component_pattern() {
        assert_eq!(RESOURCE_ID, format!("^{}$", RESOURCE_ID_PATTERN));
    }

    #[test]
    fn every_object_type_points_at_a_registered_shape() {
        use crate::value::Ty;
        fn target(ty: &Ty) -> Option<crate::ShapeId> {
            match ty {
                Ty::Object(s) => Some(*s),
                Ty::List(e) | Ty::Set(e) => target(e),
                _ => None,
            }
        }
        let registry = Registry::global();
        for shape in registry.shapes() {
            for field in &shape.fields {
                if let Some(s) = target(&field.ty) {
                    assert!(
                        registry.shape(s).is_ok(),
                        "{}.{} refers to unregistered {}",
                        shape.id,
                        field.name,
                        s
                    );
                }
            }
        }
        for kind in registry.entities() {
            assert!(registry.shape(kind.shape).is_ok(), "{}", kind.name);
        }
    }

    #[test]
    fn variant_fields_exist_on_their_family() {
        for shape in Registry::global().families() {
            let Some(u) = &shape.union else { continue };
            assert!(shape.field(u.discriminator).is_some(), "{}", u.family);
            for v in &u.variants {
                for name in v.required.iter().chain(&v.optional).chain(&u.common) {
                    assert!(shape.field(name).is_some(), "{}.{} {}", u.family, v.tag, name);
                }
            }
        }
    }

    #[test]
    fn defaults_decode_against_their_field_types() {
        let registry = Registry::global();
        for shape in registry.shapes() {
            for field in &shape.fields {
                if let Some(default) = &field.default {
                    assert!(
                        crate::host::from_json(registry, &field.ty, default).is_ok(),
                        "{}.{}",
                        shape.id,
                        field.name
                    );
                }
            }
        }
    }

    #[test]
    fn twelve_entity_kinds() {
        let names: Vec<&str> = Registry::global().entities().map(|k| k.name).collect();
        assert_eq!(names.len(), 12);
        assert!(names.contains(&"policy_management_root_policy"));
        assert!(names.contains(&"application_resource_permission"));
        assert!(names.contains(&"application_role_permission"));
    }

    #[test]
    fn only_role_permissions_are_listed_and_replace_only() {
        for kind in Registry::global().entities() {
            let assignment = kind.name == "application_role_permission";
            assert_eq!(kind.listed, assignment, "{}", kind.name);
            assert_eq!(kind.replace_only, assignment, "{}", kind.name);
            let id_field = if assignment { "application_resource_permission_id" } else { "id" };
            assert_eq!(kind.id_field, id_field, "{}", kind.name);
        }
    }
}
