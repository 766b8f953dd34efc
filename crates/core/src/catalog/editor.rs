//! Trust-framework editor building blocks: the discriminated-union
//! families and the small shapes they share.

use super::shapes::*;
use crate::constraint::{Constraint, PathRef};
use crate::registry::{Field, Registry, Shape, Variant};
use crate::value::Ty;

const VALUE_TYPES: &[&str] = &["BOOLEAN", "COLLECTION", "DATE", "JSON", "NUMBER", "STRING"];

const COMPARATORS: &[&str] = &[
    "CONTAINS",
    "EQUALS",
    "GREATER_THAN",
    "GREATER_THAN_OR_EQUAL",
    "IN",
    "LESS_THAN",
    "LESS_THAN_OR_EQUAL",
    "NOT_CONTAINS",
    "NOT_EQUALS",
    "NOT_IN",
    "REGEX",
    "STARTS_WITH",
    "ENDS_WITH",
];

pub(crate) const COMBINING_ALGORITHMS: &[&str] = &[
    "DENY_OVERRIDES",
    "DENY_UNLESS_PERMIT",
    "FIRST_APPLICABLE",
    "ONLY_ONE_APPLICABLE",
    "PERMIT_OVERRIDES",
    "PERMIT_UNLESS_DENY",
];

const SERVICE_TYPE: PathRef = PathRef::Root(&["service_type"]);

fn reference(name: &'static str) -> Field {
    Field::optional(name, Ty::object(REFERENCE))
}

fn required_if(service_type: &'static str) -> Constraint {
    Constraint::RequiredIf {
        path: SERVICE_TYPE,
        value: service_type,
    }
}

fn conflicts_if(service_type: &'static str) -> Constraint {
    Constraint::ConflictsIf {
        path: SERVICE_TYPE,
        value: service_type,
    }
}

pub(super) fn register(r: &mut Registry) {
    register_small_shapes(r);
    register_conditions(r);
    register_processors(r);
    register_resolvers(r);
    register_service_parts(r);
    register_policy_parts(r);
}

// ── Small shapes ───────────────────────────────────────────────────────

fn register_small_shapes(r: &mut Registry) {
    r.register(Shape::object(
        REFERENCE,
        vec![Field::required("id", Ty::String)],
    ));
    r.register(Shape::object(
        VALUE_TYPE,
        vec![Field::required("type", Ty::String).constraint(Constraint::OneOf(VALUE_TYPES))],
    ));
    r.register(Shape::object(
        MANAGED_ENTITY,
        vec![
            Field::optional("owner", Ty::object(MANAGED_ENTITY_OWNER)),
            Field::optional("reference", Ty::object(MANAGED_ENTITY_REFERENCE)),
            Field::optional("restrictions", Ty::object(MANAGED_ENTITY_RESTRICTIONS)),
        ],
    ));
    r.register(Shape::object(
        MANAGED_ENTITY_OWNER,
        vec![Field::optional("service", Ty::object(MANAGED_ENTITY_OWNER_SERVICE))],
    ));
    r.register(Shape::object(
        MANAGED_ENTITY_OWNER_SERVICE,
        vec![Field::optional("name", Ty::String)],
    ));
    r.register(Shape::object(
        MANAGED_ENTITY_REFERENCE,
        vec![
            Field::optional("id", Ty::String),
            Field::optional("type", Ty::String),
            Field::optional("name", Ty::String),
            Field::optional("ui_deep_link", Ty::String),
        ],
    ));
    r.register(Shape::object(
        MANAGED_ENTITY_RESTRICTIONS,
        vec![
            Field::optional("read_only", Ty::Bool),
            Field::optional("disallow_children", Ty::Bool),
        ],
    ));
    r.register(Shape::object(
        CACHE_SETTINGS,
        vec![Field::optional("ttl_seconds", Ty::Int32)],
    ));
}

// ── Conditions ─────────────────────────────────────────────────────────

fn register_conditions(r: &mut Registry) {
    r.register(Shape::union(
        COMPARAND,
        "type",
        vec![
            Field::required("type", Ty::String),
            Field::optional("id", Ty::String),
            Field::optional("value", Ty::String),
        ],
        vec![
            Variant::new("ATTRIBUTE").required(&["id"]),
            Variant::new("CONSTANT").required(&["value"]),
        ],
    ));

    r.register(Shape::union(
        CONDITION,
        "type",
        vec![
            Field::required("type", Ty::String),
            Field::optional("conditions", Ty::set(Ty::object(CONDITION))),
            Field::optional("condition", Ty::object(CONDITION)),
            Field::optional("comparator", Ty::String).constraint(Constraint::OneOf(COMPARATORS)),
            Field::optional("left", Ty::object(COMPARAND)),
            Field::optional("right", Ty::object(COMPARAND)),
            reference("reference"),
        ],
        vec![
            Variant::new("AND").required(&["conditions"]),
            Variant::new("OR").required(&["conditions"]),
            Variant::new("NOT").required(&["condition"]),
            Variant::new("COMPARISON").required(&["comparator", "left", "right"]),
            Variant::new("EMPTY"),
            Variant::new("REFERENCE").required(&["reference"]),
        ],
    ));
}

// ── Processors ─────────────────────────────────────────────────────────

fn register_processors(r: &mut Registry) {
    let expression = |tag| Variant::new(tag).required(&["expression", "value_type"]);
    r.register(
        Shape::union(
            PROCESSOR,
            "type",
            vec![
                Field::optional("name", Ty::String),
                Field::required("type", Ty::String),
                Field::optional("processors", Ty::list(Ty::object(PROCESSOR))),
                Field::optional("predicate", Ty::object(CONDITION)),
                Field::optional("processor", Ty::object(PROCESSOR)),
                Field::optional("expression", Ty::String),
                Field::optional("value_type", Ty::object(VALUE_TYPE)),
                reference("processor_ref").wire(&["processor"]),
            ],
            vec![
                Variant::new("CHAIN").required(&["processors"]),
                Variant::new("COLLECTION_FILTER").required(&["predicate"]),
                Variant::new("COLLECTION_TRANSFORM").required(&["processor"]),
                expression("JSON_PATH"),
                Variant::new("REFERENCE").required(&["processor_ref"]),
                expression("SPEL"),
                expression("XPATH"),
            ],
        )
        .common(&["name"]),
    );
}

// ── Attribute resolvers ────────────────────────────────────────────────

fn register_resolvers(r: &mut Registry) {
    r.register(Shape::object(
        RESOLVER_QUERY,
        vec![
            Field::required("type", Ty::String).constraint(Constraint::OneOf(&["USER_ID"])),
            Field::required("user_id", Ty::String),
        ],
    ));

    r.register(
        Shape::union(
            RESOLVER,
            "type",
            vec![
                Field::optional("name", Ty::String),
                Field::required("type", Ty::String),
                Field::optional("condition", Ty::object(CONDITION)),
                Field::optional("processor", Ty::object(PROCESSOR)),
                reference("value_ref").wire(&["value"]),
                Field::optional("value_type", Ty::object(VALUE_TYPE)),
                Field::optional("value", Ty::String),
                Field::optional("query", Ty::object(RESOLVER_QUERY)),
            ],
            vec![
                Variant::new("ATTRIBUTE").required(&["value_ref"]),
                Variant::new("CONSTANT")
                    .required(&["value"])
                    .optional(&["value_type"]),
                Variant::new("CURRENT_REPETITION_VALUE"),
                Variant::new("CURRENT_USER_ID"),
                Variant::new("REQUEST"),
                Variant::new("SERVICE").required(&["value_ref"]),
                Variant::new("SYSTEM").required(&["value"]),
                Variant::new("USER").required(&["query"]),
            ],
        )
        .common(&["name", "condition", "processor"]),
    );
}

// ── Service definitions ────────────────────────────────────────────────

fn register_service_parts(r: &mut Registry) {
    r.register(Shape::union(
        DATA_INPUT,
        "type",
        vec![
            Field::required("type", Ty::String),
            reference("attribute"),
            Field::optional("value", Ty::String),
        ],
        vec![
            Variant::new("ATTRIBUTE").required(&["attribute"]),
            Variant::new("CONSTANT").required(&["value"]),
        ],
    ));

    r.register(
        Shape::union(
            INPUT_MAPPING,
            "type",
            vec![
                Field::required("property", Ty::String),
                Field::required("type", Ty::String),
                reference("value_ref").wire(&["value"]),
                Field::optional("value", Ty::String),
            ],
            vec![
                Variant::new("ATTRIBUTE").required(&["value_ref"]),
                Variant::new("INPUT").required(&["value"]),
            ],
        )
        .common(&["property"]),
    );

    r.register(Shape::union(
        AUTHENTICATION,
        "type",
        vec![
            Field::required("type", Ty::String)
                .constraint(Constraint::OneOf(&["BASIC", "CLIENT_CREDENTIALS", "NONE", "TOKEN"])),
            reference("name"),
            reference("password"),
            Field::optional("token_endpoint", Ty::String),
            Field::optional("client_id", Ty::String),
            reference("client_secret"),
            Field::optional("scope", Ty::String),
            reference("token"),
        ],
        vec![
            Variant::new("BASIC").required(&["name", "password"]),
            Variant::new("CLIENT_CREDENTIALS")
                .required(&["token_endpoint", "client_id", "client_secret"])
                .optional(&["scope"]),
            Variant::new("NONE"),
            Variant::new("TOKEN").required(&["token"]),
        ],
    ));

    r.register(Shape::object(
        HEADER,
        vec![
            Field::required("key", Ty::String),
            Field::required("value", Ty::object(DATA_INPUT)),
        ],
    ));

    r.register(Shape::object(
        TLS_SETTINGS,
        vec![Field::required("tls_validation_type", Ty::String)
            .constraint(Constraint::OneOf(&["DEFAULT", "NONE"]))],
    ));

    r.register(Shape::object(
        SERVICE_SETTINGS,
        vec![
            Field::optional("maximum_concurrent_requests", Ty::Int32),
            Field::optional("maximum_requests_per_second", Ty::Float64),
            Field::optional("timeout_milliseconds", Ty::Int32),
            Field::optional("url", Ty::String)
                .constraint(required_if("HTTP"))
                .constraint(conflicts_if("CONNECTOR")),
            Field::optional("verb", Ty::String)
                .constraint(Constraint::OneOf(&[
                    "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT",
                ]))
                .constraint(required_if("HTTP"))
                .constraint(conflicts_if("CONNECTOR")),
            Field::optional("body", Ty::String).constraint(conflicts_if("CONNECTOR")),
            Field::optional("content_type", Ty::String).constraint(conflicts_if("CONNECTOR")),
            Field::optional("headers", Ty::set(Ty::object(HEADER)))
                .constraint(conflicts_if("CONNECTOR")),
            Field::optional("authentication", Ty::object(AUTHENTICATION))
                .constraint(required_if("HTTP"))
                .constraint(conflicts_if("CONNECTOR")),
            Field::optional("tls_settings", Ty::object(TLS_SETTINGS))
                .constraint(conflicts_if("CONNECTOR")),
            Field::optional("channel", Ty::String)
                .constraint(required_if("CONNECTOR"))
                .constraint(conflicts_if("HTTP")),
            Field::optional("code", Ty::String)
                .constraint(required_if("CONNECTOR"))
                .constraint(conflicts_if("HTTP")),
            Field::optional("capability", Ty::String)
                .constraint(required_if("CONNECTOR"))
                .constraint(conflicts_if("HTTP")),
            Field::optional("schema_version", Ty::Int32).constraint(conflicts_if("HTTP")),
            Field::optional("input_mappings", Ty::list(Ty::object(INPUT_MAPPING)))
                .constraint(required_if("CONNECTOR"))
                .constraint(conflicts_if("HTTP")),
        ],
    ));
}

// ── Policies ───────────────────────────────────────────────────────────

fn register_policy_parts(r: &mut Registry) {
    r.register(Shape::union(
        RULE_EFFECT_SETTINGS,
        "type",
        vec![
            Field::required("type", Ty::String),
            Field::optional("condition", Ty::object(CONDITION)),
        ],
        vec![
            Variant::new("CONDITIONAL_DENY_ELSE_PERMIT").required(&["condition"]),
            Variant::new("CONDITIONAL_PERMIT_ELSE_DENY").required(&["condition"]),
            Variant::new("UNCONDITIONAL_DENY"),
            Variant::new("UNCONDITIONAL_PERMIT"),
        ],
    ));

    r.register(Shape::object(
        COMBINING_ALGORITHM,
        vec![Field::required("algorithm", Ty::String)
            .constraint(Constraint::OneOf(COMBINING_ALGORITHMS))],
    ));

    r.register(Shape::object(
        REPETITION_SETTINGS,
        vec![
            Field::required("source", Ty::object(REFERENCE)),
            Field::required("decision", Ty::String)
                .constraint(Constraint::OneOf(&["DENY", "PERMIT"])),
        ],
    ));

    const INLINE: &[&str] = &[
        "name",
        "description",
        "enabled",
        "condition",
        "combining_algorithm",
        "children",
        "repetition_settings",
        "effect_settings",
    ];
    r.register(Shape::union(
        POLICY_CHILD,
        "type",
        vec![
            Field::required("type", Ty::String),
            Field::optional("name", Ty::String),
            Field::optional("description", Ty::String),
            Field::optional("enabled", Ty::Bool),
            Field::optional("condition", Ty::object(CONDITION)),
            Field::optional("combining_algorithm", Ty::object(COMBINING_ALGORITHM)),
            Field::optional("children", Ty::list(Ty::object(POLICY_CHILD))),
            Field::optional("repetition_settings", Ty::object(REPETITION_SETTINGS)),
            Field::optional("effect_settings", Ty::object(RULE_EFFECT_SETTINGS)),
            reference("value").constraint(Constraint::ConflictsWith(INLINE)),
        ],
        vec![
            Variant::new("POLICY").optional(&[
                "name",
                "description",
                "enabled",
                "condition",
                "combining_algorithm",
                "children",
                "repetition_settings",
                "value",
            ]),
            Variant::new("RULE").optional(&[
                "name",
                "description",
                "enabled",
                "condition",
                "effect_settings",
                "value",
            ]),
        ],
    ));
}
