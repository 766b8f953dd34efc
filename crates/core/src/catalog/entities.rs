//! Top-level entity shapes and their API endpoints.

use serde_json::json;

use super::shapes::*;
use super::{
    description, environment_id, full_name, id, name, parent, path_id, version, RESOURCE_ID,
};
use crate::constraint::{Constraint, PathRef};
use crate::entity::{DeleteMode, EntityKind};
use crate::import::ImportComponent;
use crate::registry::{Field, Registry, Shape, Variant};
use crate::value::{ShapeId, Ty};

pub(super) fn register(r: &mut Registry) {
    register_trust_framework(r);
    register_policy_management(r);
    register_api_services(r);
    register_application_resources(r);
}

fn kind(
    name: &'static str,
    noun: &'static str,
    shape: ShapeId,
    collection: &'static str,
    import: Vec<ImportComponent>,
    delete: DeleteMode,
) -> EntityKind {
    EntityKind {
        name,
        noun,
        shape,
        collection,
        import,
        delete,
        singleton: false,
        id_field: "id",
        listed: false,
        replace_only: false,
    }
}

fn env_scoped(primary: &'static str) -> Vec<ImportComponent> {
    vec![
        ImportComponent::resource_id("environment_id"),
        ImportComponent::primary(primary),
    ]
}

// ── Trust framework ────────────────────────────────────────────────────

fn register_trust_framework(r: &mut Registry) {
    r.register(Shape::object(
        ATTRIBUTE,
        vec![
            id(),
            environment_id(),
            name(),
            full_name(),
            description(),
            parent(),
            Field::optional_computed("type", Ty::String).default(json!("ATTRIBUTE")),
            Field::optional("default_value", Ty::String),
            Field::computed("managed_entity", Ty::object(MANAGED_ENTITY)),
            Field::optional("processor", Ty::object(PROCESSOR)),
            Field::optional("repetition_source", Ty::object(REFERENCE)),
            Field::optional_computed("resolvers", Ty::list(Ty::object(RESOLVER)))
                .default(json!([])),
            Field::optional("value_schema", Ty::String),
            Field::required("value_type", Ty::object(VALUE_TYPE)),
            version(),
        ],
    ));
    r.register_entity(kind(
        "trust_framework_attribute",
        "Attribute",
        ATTRIBUTE,
        "/environments/{environment_id}/authorizationAttributes",
        env_scoped("attribute_id"),
        DeleteMode::Confirmed,
    ));

    r.register(Shape::object(
        CONDITION_DEFINITION,
        vec![
            id(),
            environment_id(),
            name(),
            full_name(),
            description(),
            parent(),
            Field::optional_computed("type", Ty::String).default(json!("CONDITION")),
            Field::required("condition", Ty::object(CONDITION)),
            version(),
        ],
    ));
    r.register_entity(kind(
        "trust_framework_condition",
        "Condition",
        CONDITION_DEFINITION,
        "/environments/{environment_id}/authorizationConditions",
        env_scoped("condition_id"),
        DeleteMode::Immediate,
    ));

    r.register(Shape::object(
        PROCESSOR_DEFINITION,
        vec![
            id(),
            environment_id(),
            name(),
            full_name(),
            description(),
            parent(),
            Field::optional_computed("type", Ty::String).default(json!("PROCESSOR")),
            Field::required("processor", Ty::object(PROCESSOR)),
            version(),
        ],
    ));
    r.register_entity(kind(
        "trust_framework_processor",
        "Processor",
        PROCESSOR_DEFINITION,
        "/environments/{environment_id}/authorizationProcessors",
        env_scoped("processor_id"),
        DeleteMode::Immediate,
    ));

    r.register(
        Shape::union(
            SERVICE,
            "service_type",
            vec![
                id(),
                environment_id(),
                name(),
                full_name(),
                description(),
                parent(),
                Field::optional_computed("type", Ty::String).default(json!("SERVICE")),
                Field::optional("cache_settings", Ty::object(CACHE_SETTINGS)),
                Field::required("service_type", Ty::String)
                    .constraint(Constraint::OneOf(&["CONNECTOR", "HTTP", "NONE"])),
                Field::optional("processor", Ty::object(PROCESSOR)),
                Field::optional("value_type", Ty::object(VALUE_TYPE)),
                Field::optional("service_settings", Ty::object(SERVICE_SETTINGS)),
                version(),
            ],
            vec![
                Variant::new("HTTP")
                    .required(&["value_type", "service_settings"])
                    .optional(&["processor"]),
                Variant::new("CONNECTOR")
                    .required(&["value_type", "service_settings"])
                    .optional(&["processor"]),
                Variant::new("NONE"),
            ],
        )
        .common(&[
            "id",
            "environment_id",
            "name",
            "full_name",
            "description",
            "parent",
            "type",
            "cache_settings",
            "version",
        ]),
    );
    r.register_entity(kind(
        "trust_framework_service",
        "Service",
        SERVICE,
        "/environments/{environment_id}/authorizationServices",
        env_scoped("service_id"),
        DeleteMode::Immediate,
    ));
}

// ── Policy management ──────────────────────────────────────────────────

fn register_policy_management(r: &mut Registry) {
    r.register(Shape::object(
        STATEMENT,
        vec![
            id(),
            environment_id(),
            name(),
            Field::required("description", Ty::String),
            Field::required("code", Ty::String).constraint(Constraint::LengthAtLeast(1)),
            Field::required("applies_to", Ty::String)
                .constraint(Constraint::OneOf(&["ANY_DECISION", "PERMIT_DECISION", "DENY_DECISION"])),
            Field::required("applies_if", Ty::String)
                .constraint(Constraint::OneOf(&["FINAL_DECISION_MATCHES", "PATH_MATCHES"])),
            Field::required("payload", Ty::String).constraint(Constraint::LengthAtLeast(1)),
            Field::optional_computed("obligatory", Ty::Bool).default(json!(false)),
            Field::required("attributes", Ty::set(Ty::object(REFERENCE))),
            version(),
        ],
    ));
    r.register_entity(kind(
        "policy_management_statement",
        "Statement",
        STATEMENT,
        "/environments/{environment_id}/authorizationStatements",
        env_scoped("statement_id"),
        DeleteMode::Immediate,
    ));

    r.register(Shape::object(
        RULE,
        vec![
            id(),
            environment_id(),
            name(),
            description(),
            Field::optional_computed("enabled", Ty::Bool).default(json!(true)),
            Field::optional_computed("condition", Ty::object(CONDITION))
                .default(json!({"type": "EMPTY"})),
            Field::required("effect_settings", Ty::object(RULE_EFFECT_SETTINGS)),
            version(),
        ],
    ));
    r.register_entity(kind(
        "policy_management_rule",
        "Rule",
        RULE,
        "/environments/{environment_id}/authorizationRules",
        env_scoped("rule_id"),
        DeleteMode::Confirmed,
    ));

    r.register(Shape::object(POLICY, policy_fields()));
    r.register_entity(kind(
        "policy_management_policy",
        "Policy",
        POLICY,
        "/environments/{environment_id}/authorizationPolicies",
        env_scoped("policy_id"),
        DeleteMode::Confirmed,
    ));

    r.register(Shape::object(ROOT_POLICY, policy_fields()));
    r.register_entity(EntityKind {
        singleton: true,
        ..kind(
            "policy_management_root_policy",
            "Policy",
            ROOT_POLICY,
            "/environments/{environment_id}/authorizationPolicies",
            vec![ImportComponent::resource_id("environment_id")],
            DeleteMode::Reset,
        )
    });
}

fn policy_fields() -> Vec<Field> {
    vec![
        id(),
        environment_id(),
        name(),
        description(),
        Field::optional_computed("enabled", Ty::Bool).default(json!(true)),
        Field::optional("condition", Ty::object(CONDITION)),
        Field::required("combining_algorithm", Ty::object(COMBINING_ALGORITHM)),
        Field::optional("children", Ty::list(Ty::object(POLICY_CHILD))),
        Field::optional("repetition_settings", Ty::object(REPETITION_SETTINGS)),
        version(),
    ]
}

// ── API services ───────────────────────────────────────────────────────

const AUTHORIZATION_SERVER_TYPES: &[&str] = &["EXTERNAL", "PINGONE_SSO"];

fn register_api_services(r: &mut Registry) {
    r.register(Shape::object(
        AUTHORIZATION_SERVER,
        vec![
            Field::optional("resource_id", Ty::String)
                .constraint(Constraint::RequiredIf {
                    path: PathRef::Sibling("type"),
                    value: "PINGONE_SSO",
                })
                .constraint(Constraint::ConflictsIf {
                    path: PathRef::Sibling("type"),
                    value: "EXTERNAL",
                }),
            Field::required("type", Ty::String)
                .constraint(Constraint::OneOf(AUTHORIZATION_SERVER_TYPES)),
        ],
    ));
    r.register(Shape::object(
        DIRECTORY,
        vec![Field::required("type", Ty::String)
            .constraint(Constraint::OneOf(AUTHORIZATION_SERVER_TYPES))],
    ));
    r.register(Shape::object(
        ACCESS_CONTROL_CUSTOM,
        vec![Field::required("enabled", Ty::Bool)],
    ));
    r.register(Shape::object(
        ACCESS_CONTROL,
        vec![Field::required("custom", Ty::object(ACCESS_CONTROL_CUSTOM))],
    ));

    r.register(Shape::object(
        API_SERVICE,
        vec![
            id(),
            environment_id(),
            name(),
            Field::optional_computed("access_control", Ty::object(ACCESS_CONTROL))
                .default(json!({"custom": {"enabled": false}})),
            Field::required("authorization_server", Ty::object(AUTHORIZATION_SERVER)),
            Field::required("base_urls", Ty::set(Ty::String))
                .constraint(Constraint::LengthAtLeast(1)),
            Field::optional_computed("directory", Ty::object(DIRECTORY))
                .default(json!({"type": "PINGONE_SSO"})),
            Field::computed("policy_id", Ty::String).wire(&["policy", "id"]),
        ],
    ));
    r.register_entity(kind(
        "api_service",
        "APIServer",
        API_SERVICE,
        "/environments/{environment_id}/apiServers",
        env_scoped("api_service_id"),
        DeleteMode::Immediate,
    ));

    r.register(Shape::object(
        OPERATION_PATH,
        vec![
            Field::required("type", Ty::String)
                .constraint(Constraint::OneOf(&["EXACT", "PARAMETER"])),
            Field::required("pattern", Ty::String).constraint(Constraint::LengthAtLeast(1)),
        ],
    ));
    r.register(Shape::object(
        OPERATION_ACCESS_GROUP,
        vec![Field::required("groups", Ty::set(Ty::object(REFERENCE)))
            .constraint(Constraint::LengthAtLeast(1))],
    ));
    r.register(Shape::object(
        OPERATION_ACCESS_CONTROL,
        vec![
            Field::optional("group", Ty::object(OPERATION_ACCESS_GROUP)),
            Field::optional("permission", Ty::object(REFERENCE)),
        ],
    ));
    r.register(Shape::object(
        API_SERVICE_OPERATION,
        vec![
            id(),
            environment_id(),
            path_id("api_service_id"),
            name(),
            Field::optional("access_control", Ty::object(OPERATION_ACCESS_CONTROL)),
            Field::optional("methods", Ty::set(Ty::String)),
            Field::required("paths", Ty::set(Ty::object(OPERATION_PATH)))
                .constraint(Constraint::LengthAtLeast(1)),
        ],
    ));
    r.register_entity(kind(
        "api_service_operation",
        "APIServerOperation",
        API_SERVICE_OPERATION,
        "/environments/{environment_id}/apiServers/{api_service_id}/operations",
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::resource_id("api_service_id"),
            ImportComponent::primary("api_service_operation_id"),
        ],
        DeleteMode::Immediate,
    ));
}

// ── Application resources ──────────────────────────────────────────────

fn register_application_resources(r: &mut Registry) {
    r.register(Shape::object(
        PERMISSION_RESOURCE,
        vec![
            Field::optional("id", Ty::String),
            Field::optional("name", Ty::String),
        ],
    ));
    r.register(Shape::object(
        APPLICATION_RESOURCE_PERMISSION,
        vec![
            id(),
            environment_id(),
            path_id("application_resource_id"),
            Field::required("action", Ty::String)
                .constraint(Constraint::Matches(r"^[\p{L}\p{M}\p{N} /.'_-]*$")),
            description(),
            Field::computed("resource", Ty::object(PERMISSION_RESOURCE)),
        ],
    ));
    r.register_entity(kind(
        "application_resource_permission",
        "ApplicationResourcePermission",
        APPLICATION_RESOURCE_PERMISSION,
        "/environments/{environment_id}/applicationResources/{application_resource_id}/permissions",
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::resource_id("application_resource_id"),
            ImportComponent::primary("application_resource_permission_id"),
        ],
        DeleteMode::Immediate,
    ));

    // Assigns an existing resource permission to an application role. The
    // assignment is addressed by the permission's own id and has no item
    // GET.
    r.register(Shape::object(
        APPLICATION_ROLE_PERMISSION,
        vec![
            path_id("environment_id"),
            path_id("application_role_id"),
            Field::required("application_resource_permission_id", Ty::String)
                .wire(&["id"])
                .constraint(Constraint::Matches(RESOURCE_ID)),
            Field::computed("action", Ty::String),
            Field::computed("description", Ty::String),
            Field::computed("key", Ty::String),
            Field::computed("resource", Ty::object(PERMISSION_RESOURCE)),
        ],
    ));
    r.register_entity(EntityKind {
        id_field: "application_resource_permission_id",
        listed: true,
        replace_only: true,
        ..kind(
            "application_role_permission",
            "ApplicationRolePermission",
            APPLICATION_ROLE_PERMISSION,
            "/environments/{environment_id}/applicationRoles/{application_role_id}/permissions",
            vec![
                ImportComponent::resource_id("environment_id"),
                ImportComponent::resource_id("application_role_id"),
                ImportComponent::resource_id("application_resource_permission_id"),
            ],
            DeleteMode::Immediate,
        )
    });
}
