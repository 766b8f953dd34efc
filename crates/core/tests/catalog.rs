//! Endpoint, import and delete behaviour of every built-in entity kind.

use p1authz_core::{import, DeleteMode, Registry, Value};
use pretty_assertions::assert_eq;

const ENV: &str = "8c6e0b4a-5d2f-4f1e-9a3b-2c7d8e9f0a1b";
const SERVER: &str = "5a4b3c2d-1e0f-4a9b-8c7d-6e5f4a3b2c1d";
const ITEM: &str = "0f8e7d6c-5b4a-4392-8170-6e5d4c3b2a19";

struct Expected {
    name: &'static str,
    collection: &'static str,
    import: &'static str,
    delete: DeleteMode,
}

const TABLE: &[Expected] = &[
    Expected {
        name: "trust_framework_attribute",
        collection: "/environments/{environment_id}/authorizationAttributes",
        import: "environment_id/attribute_id",
        delete: DeleteMode::Confirmed,
    },
    Expected {
        name: "trust_framework_condition",
        collection: "/environments/{environment_id}/authorizationConditions",
        import: "environment_id/condition_id",
        delete: DeleteMode::Immediate,
    },
    Expected {
        name: "trust_framework_processor",
        collection: "/environments/{environment_id}/authorizationProcessors",
        import: "environment_id/processor_id",
        delete: DeleteMode::Immediate,
    },
    Expected {
        name: "trust_framework_service",
        collection: "/environments/{environment_id}/authorizationServices",
        import: "environment_id/service_id",
        delete: DeleteMode::Immediate,
    },
    Expected {
        name: "policy_management_statement",
        collection: "/environments/{environment_id}/authorizationStatements",
        import: "environment_id/statement_id",
        delete: DeleteMode::Immediate,
    },
    Expected {
        name: "policy_management_rule",
        collection: "/environments/{environment_id}/authorizationRules",
        import: "environment_id/rule_id",
        delete: DeleteMode::Confirmed,
    },
    Expected {
        name: "policy_management_policy",
        collection: "/environments/{environment_id}/authorizationPolicies",
        import: "environment_id/policy_id",
        delete: DeleteMode::Confirmed,
    },
    Expected {
        name: "policy_management_root_policy",
        collection: "/environments/{environment_id}/authorizationPolicies",
        import: "environment_id",
        delete: DeleteMode::Reset,
    },
    Expected {
        name: "api_service",
        collection: "/environments/{environment_id}/apiServers",
        import: "environment_id/api_service_id",
        delete: DeleteMode::Immediate,
    },
    Expected {
        name: "api_service_operation",
        collection: "/environments/{environment_id}/apiServers/{api_service_id}/operations",
        import: "environment_id/api_service_id/api_service_operation_id",
        delete: DeleteMode::Immediate,
    },
    Expected {
        name: "application_resource_permission",
        collection: "/environments/{environment_id}/applicationResources/{application_resource_id}/permissions",
        import: "environment_id/application_resource_id/application_resource_permission_id",
        delete: DeleteMode::Immediate,
    },
    Expected {
        name: "application_role_permission",
        collection: "/environments/{environment_id}/applicationRoles/{application_role_id}/permissions",
        import: "environment_id/application_role_id/application_resource_permission_id",
        delete: DeleteMode::Immediate,
    },
];

#[test]
fn endpoints_import_formats_and_delete_modes() {
    let registry = Registry::global();
    for expected in TABLE {
        let kind = registry
            .entity(expected.name)
            .unwrap_or_else(|| panic!("{} not registered", expected.name));
        assert_eq!(kind.collection, expected.collection, "{}", expected.name);
        assert_eq!(kind.import_format(), expected.import, "{}", expected.name);
        assert_eq!(kind.delete, expected.delete, "{}", expected.name);
        assert_eq!(kind.singleton, expected.delete == DeleteMode::Reset, "{}", expected.name);
    }
}

#[test]
fn parsed_import_ids_address_the_item() {
    let registry = Registry::global();
    for expected in TABLE {
        let kind = registry.entity(expected.name).unwrap();
        let id: Vec<&str> = expected
            .import
            .split('/')
            .map(|label| match label {
                "environment_id" => ENV,
                "api_service_id" | "application_resource_id" | "application_role_id" => SERVER,
                _ => ITEM,
            })
            .collect();
        let id = id.join("/");

        let parsed = import::parse(&kind.import, &id).unwrap();
        assert_eq!(import::compose(&kind.import, &parsed).as_deref(), Some(id.as_str()));

        let seed = Value::object(
            kind.shape,
            parsed
                .iter()
                .filter(|(k, _)| k.as_str() != "id")
                .map(|(k, v)| (k.clone(), Value::string(v.clone()))),
        );
        let path = kind.collection_path(&seed).unwrap();
        assert!(!path.contains('{'), "{}: {}", expected.name, path);
        assert!(path.starts_with(&format!("/environments/{}/", ENV)));
        if !kind.singleton {
            let item = seed.get_str(kind.id_field).or_else(|| parsed.get("id").map(String::as_str));
            assert_eq!(item, Some(ITEM), "{}", expected.name);
        }
    }
}

#[test]
fn role_permission_body_names_the_assigned_permission() {
    let registry = Registry::global();
    let kind = registry.entity("application_role_permission").unwrap();
    let seed = Value::object(
        kind.shape,
        [
            ("environment_id", Value::string(ENV)),
            ("application_role_id", Value::string(SERVER)),
            ("application_resource_permission_id", Value::string(ITEM)),
        ],
    );
    assert_eq!(kind.item_id(&seed), Some(ITEM));
    let shape = registry.shape(kind.shape).unwrap();
    let writable: Vec<&str> = shape
        .fields
        .iter()
        .filter(|f| f.is_writable())
        .map(|f| f.name)
        .collect();
    assert_eq!(writable, vec!["application_resource_permission_id"]);
    assert_eq!(
        shape.field("application_resource_permission_id").and_then(|f| f.wire_key()),
        Some("id")
    );
}

#[test]
fn import_rejects_extra_components() {
    let kind = Registry::global().entity("policy_management_rule").unwrap();
    let err = import::parse(&kind.import, &format!("{}/{}/{}", ENV, ITEM, ITEM)).unwrap_err();
    assert_eq!(err.kind(), p1authz_core::ErrorKind::UnexpectedImportIdentifier);
}

#[test]
fn operation_labels_use_the_api_noun() {
    let registry = Registry::global();
    let rule = registry.entity("policy_management_rule").unwrap();
    assert_eq!(rule.operation("Create"), "CreateRule");
    assert_eq!(rule.operation("Get"), "GetRule");
    let operation = registry.entity("api_service_operation").unwrap();
    assert_eq!(operation.operation("Delete"), "DeleteAPIServerOperation");
}
