use crate::error::Error;
use crate::host;
use crate::registry::Registry;
use crate::value::{Tri, Value};

/// Replace Null fields that declare a schema default with that default,
/// at every depth of Known objects.
pub fn apply_defaults(registry: &Registry, value: &mut Value) -> Result<(), Error> {
    let mut stack: Vec<&mut Value> = vec![value];
    while let Some(node) = stack.pop() {
        match node {
            Value::Object(shape_id, Tri::Known(fields)) => {
                let shape = registry.shape(*shape_id)?;
                for field in &shape.fields {
                    let Some(default) = &field.default else {
                        continue;
                    };
                    let missing = fields.get(field.name).map_or(true, Value::is_null);
                    if missing {
                        let filled = host::from_json(registry, &field.ty, default)?;
                        fields.insert(field.name.to_string(), filled);
                    }
                }
                stack.extend(fields.values_mut());
            }
            Value::List(_, Tri::Known(items)) | Value::Set(_, Tri::Known(items)) => {
                stack.extend(items.iter_mut());
            }
            _ => {}
        }
    }
    Ok(())
}
