//! Entity kinds: where each top-level resource lives on the API and how
//! it is imported and deleted.

use crate::error::Error;
use crate::import::{self, ImportComponent};
use crate::value::{ShapeId, Value};

/// How a Delete concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// The DELETE response is final.
    Immediate,
    /// Poll GET until absence is confirmed.
    Confirmed,
    /// The entity cannot be deleted; it is reset to its initial content.
    Reset,
}

/// A top-level resource managed by the reconciler.
#[derive(Debug, Clone)]
pub struct EntityKind {
    /// Host-facing name, e.g. `policy_management_rule`.
    pub name: &'static str,
    /// API noun used in operation labels (`CreateRule`, `GetRule-Update`).
    pub noun: &'static str,
    pub shape: ShapeId,
    /// Collection path with `{field}` placeholders resolved from the
    /// entity's host fields.
    pub collection: &'static str,
    pub import: Vec<ImportComponent>,
    pub delete: DeleteMode,
    /// Exactly one instance exists per environment; it is located, never
    /// created.
    pub singleton: bool,
    /// Host field holding the identifier that ends the item path.
    pub id_field: &'static str,
    /// The API has no item GET; Read finds the item in the collection
    /// listing.
    pub listed: bool,
    /// Every field forces replacement, so Update is refused.
    pub replace_only: bool,
}

impl EntityKind {
    /// Resolve the collection path against a plan or state value.
    pub fn collection_path(&self, value: &Value) -> Result<String, Error> {
        let mut out = String::with_capacity(self.collection.len() + 72);
        let mut rest = self.collection;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let Some(len) = rest[start..].find('}') else {
                return Err(Error::invalid(
                    self.name,
                    format!("unterminated placeholder in {}", self.collection),
                ));
            };
            let field = &rest[start + 1..start + len];
            match value.get_str(field) {
                Some(v) if !v.is_empty() => out.push_str(v),
                _ => {
                    return Err(Error::invalid(
                        &format!(".{}", field),
                        "must be known to address the API",
                    ))
                }
            }
            rest = &rest[start + len + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// The item identifier carried by a plan or state value.
    pub fn item_id<'v>(&self, value: &'v Value) -> Option<&'v str> {
        value.get_str(self.id_field).filter(|id| !id.is_empty())
    }

    /// Collection path plus `/{id}`.
    pub fn item_path(&self, value: &Value, id: &str) -> Result<String, Error> {
        Ok(format!("{}/{}", self.collection_path(value)?, id))
    }

    /// Human-readable import format, e.g. `environment_id/rule_id`.
    pub fn import_format(&self) -> String {
        import::format(&self.import)
    }

    pub fn operation(&self, verb: &str) -> String {
        format!("{}{}", verb, self.noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation_kind() -> EntityKind {
        EntityKind {
            name: "api_service_operation",
            noun: "APIServerOperation",
            shape: ShapeId("ApiServiceOperation"),
            collection: "/environments/{environment_id}/apiServers/{api_service_id}/operations",
            import: vec![
                ImportComponent::resource_id("environment_id"),
                ImportComponent::resource_id("api_service_id"),
                ImportComponent::primary("api_service_operation_id"),
            ],
            delete: DeleteMode::Immediate,
            singleton: false,
            id_field: "id",
            listed: false,
            replace_only: false,
        }
    }

    fn state(env: &str, svc: &str) -> Value {
        Value::object(
            ShapeId("ApiServiceOperation"),
            [
                ("environment_id", Value::string(env)),
                ("api_service_id", Value::string(svc)),
            ],
        )
    }

    #[test]
    fn collection_path_substitutes_host_fields() {
        let kind = operation_kind();
        assert_eq!(
            kind.collection_path(&state("env1", "svc1")).unwrap(),
            "/environments/env1/apiServers/svc1/operations"
        );
        assert_eq!(
            kind.item_path(&state("env1", "svc1"), "op1").unwrap(),
            "/environments/env1/apiServers/svc1/operations/op1"
        );
    }

    #[test]
    fn unresolved_placeholder_is_an_error() {
        let kind = operation_kind();
        let err = kind.collection_path(&state("env1", "")).unwrap_err();
        assert_eq!(err.to_string(), "api_service_id: must be known to address the API");
    }

    #[test]
    fn labels_and_format() {
        let kind = operation_kind();
        assert_eq!(kind.operation("Get"), "GetAPIServerOperation");
        assert_eq!(
            kind.import_format(),
            "environment_id/api_service_id/api_service_operation_id"
        );
    }

    #[test]
    fn item_id_reads_the_declared_field() {
        let mut kind = operation_kind();
        let mut value = state("env1", "svc1");
        assert_eq!(kind.item_id(&value), None);
        value.set_field("id", Value::string("op1"));
        assert_eq!(kind.item_id(&value), Some("op1"));

        kind.id_field = "api_service_id";
        assert_eq!(kind.item_id(&value), Some("svc1"));
        assert_eq!(kind.item_id(&state("env1", "")), None);
    }
}
