//! Union Dispatcher: picks the variant of a union node, from the host side
//! on expand and from the wire side on flatten.

use p1authz_core::{Error, Fields, Registry, Shape, Ty, Value, Variant};
use serde_json::{Map, Value as Json};

use crate::{expand, flatten};

/// Variant chosen by a host node. Plain shapes have none.
///
/// Fails with `MissingDiscriminator` when the discriminator is Null or
/// Unknown, and with `UnknownVariant` when the tag is not registered.
pub fn host_variant<'r>(shape: &'r Shape, fields: &Fields) -> Result<Option<&'r Variant>, Error> {
    let Some(u) = &shape.union else {
        return Ok(None);
    };
    let tag = fields
        .get(u.discriminator)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingDiscriminator {
            family: u.family.to_string(),
            field: u.discriminator.to_string(),
        })?;
    shape
        .variant(tag)
        .map(Some)
        .ok_or_else(|| Error::UnknownVariant {
            family: u.family.to_string(),
            tag: tag.to_string(),
        })
}

/// Variant realised by a wire object.
///
/// A tag the registry does not know is `UnsupportedVariant`: the server
/// is ahead of this client and the caller must leave its state alone.
pub fn wire_variant<'r>(shape: &'r Shape, wire: &Map<String, Json>) -> Result<Option<&'r Variant>, Error> {
    let Some(u) = &shape.union else {
        return Ok(None);
    };
    let key = shape
        .field(u.discriminator)
        .and_then(|f| f.wire_key())
        .unwrap_or(u.discriminator);
    let tag = wire
        .get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| Error::MissingDiscriminator {
            family: u.family.to_string(),
            field: u.discriminator.to_string(),
        })?;
    shape
        .variant(tag)
        .map(Some)
        .ok_or_else(|| Error::UnsupportedVariant {
            family: u.family.to_string(),
            tag: tag.to_string(),
        })
}

fn family<'r>(registry: &'r Registry, name: &str) -> Result<&'r Shape, Error> {
    registry
        .family(name)
        .ok_or_else(|| Error::UnknownShape(name.to_string()))
}

/// Expand a node of union family `family_name`.
pub fn dispatch_expand(registry: &Registry, family_name: &str, value: &Value) -> Result<Json, Error> {
    let shape = family(registry, family_name)?;
    if let Some(fields) = value.fields() {
        host_variant(shape, fields)?;
    } else if value.shape() == Some(shape.id) {
        // A Null or Unknown node has no discriminator to read.
        let u = shape.union.as_ref().map(|u| u.discriminator).unwrap_or("type");
        return Err(Error::MissingDiscriminator {
            family: family_name.to_string(),
            field: u.to_string(),
        });
    }
    expand::expand(registry, value)
}

/// Flatten a wire document of union family `family_name`.
///
/// The discriminator is set from the realised variant and every field
/// the variant does not own comes back as a typed Null.
pub fn dispatch_flatten(
    registry: &Registry,
    family_name: &str,
    wire: &Json,
    prior: Option<&Value>,
) -> Result<Value, Error> {
    let shape = family(registry, family_name)?;
    if let Some(obj) = wire.as_object() {
        wire_variant(shape, obj)?;
    }
    flatten::flatten(registry, &Ty::Object(shape.id), wire, prior)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use p1authz_core::{host, shapes, ErrorKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn reg() -> &'static Registry {
        Registry::global()
    }

    fn condition(doc: Json) -> Value {
        host::from_json(reg(), &Ty::object(shapes::CONDITION), &doc).unwrap()
    }

    #[test]
    fn missing_discriminator_on_expand() {
        let err = dispatch_expand(reg(), "Condition", &condition(json!({"type": null}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingDiscriminator);

        let err = dispatch_expand(
            reg(),
            "Condition",
            &condition(json!({"type": {"$unknown": true}})),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingDiscriminator);

        let err = dispatch_expand(reg(), "Condition", &Value::null(&Ty::object(shapes::CONDITION)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingDiscriminator);
    }

    #[test]
    fn unknown_variant_on_expand() {
        let err = dispatch_expand(reg(), "Condition", &condition(json!({"type": "XOR"}))).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownVariant {
                family: "Condition".to_string(),
                tag: "XOR".to_string()
            }
        );
    }

    #[test]
    fn unsupported_variant_on_flatten() {
        let err = dispatch_flatten(reg(), "Processor", &json!({"type": "WASM", "module": "x"}), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVariant);
        assert_eq!(
            err.to_string(),
            "Processor: server returned unsupported variant 'WASM'"
        );
    }

    #[test]
    fn flatten_sets_discriminator_and_nulls_siblings() {
        let v = dispatch_flatten(
            reg(),
            "Authentication",
            &json!({"type": "TOKEN", "token": {"id": "t1"}}),
            None,
        )
        .unwrap();
        assert_eq!(v.get_str("type"), Some("TOKEN"));
        assert_eq!(v.get_path(&["token", "id"]).and_then(Value::as_str), Some("t1"));
        for sibling in ["name", "password", "client_secret"] {
            assert_eq!(v.get(sibling), Some(&Value::null(&Ty::object(shapes::REFERENCE))));
        }
        for sibling in ["token_endpoint", "client_id", "scope"] {
            assert_eq!(v.get(sibling), Some(&Value::null(&Ty::String)));
        }
    }

    #[test]
    fn variant_lookup_on_plain_shape_is_none() {
        let shape = reg().shape(shapes::REFERENCE).unwrap();
        assert!(host_variant(shape, &Fields::new()).unwrap().is_none());
        assert!(wire_variant(shape, &Map::new()).unwrap().is_none());
    }

    #[test]
    fn unknown_family_name() {
        let err = dispatch_flatten(reg(), "Widget", &json!({}), None).unwrap_err();
        assert_eq!(err, Error::UnknownShape("Widget".to_string()));
    }
}
