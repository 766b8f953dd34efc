//! The single "null out absent" step shared by host decoding and the
//! codec: any field of a shape that a node does not carry becomes a typed
//! Null of the declared shape.

use crate::registry::Shape;
use crate::value::{Fields, Value};

/// Insert a typed Null for every field of `shape` missing from `fields`.
pub fn fill_absent(shape: &Shape, fields: &mut Fields) {
    for field in &shape.fields {
        if !fields.contains_key(field.name) {
            fields.insert(field.name.to_string(), Value::null(&field.ty));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Field;
    use crate::value::{ShapeId, Tri, Ty};

    #[test]
    fn missing_fields_become_typed_nulls() {
        let shape = Shape::object(
            ShapeId("Thing"),
            vec![
                Field::optional("name", Ty::String),
                Field::optional("tags", Ty::set(Ty::String)),
                Field::optional("child", Ty::object(ShapeId("Thing"))),
            ],
        );
        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::string("kept"));
        fill_absent(&shape, &mut fields);

        assert_eq!(fields["name"], Value::string("kept"));
        assert_eq!(fields["tags"], Value::Set(Ty::String, Tri::Null));
        assert_eq!(fields["child"], Value::Object(ShapeId("Thing"), Tri::Null));
    }
}
