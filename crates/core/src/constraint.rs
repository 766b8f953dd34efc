//! Schema constraints and plan validation.
//!
//! Unknown values never violate a constraint: they are checked again once
//! the host has resolved them.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use regex::Regex;

use crate::error::Error;
use crate::registry::{FieldMode, Registry, Shape};
use crate::value::{Fields, Value};

/// Where a cross-field constraint looks for the value it compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRef {
    /// Path of field names from the root of the planned entity.
    Root(&'static [&'static str]),
    /// Field of the object that encloses the constrained field.
    Sibling(&'static str),
}

impl PathRef {
    fn describe(&self) -> String {
        match self {
            PathRef::Root(path) => path.join("."),
            PathRef::Sibling(name) => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// String length, or element count for lists and sets.
    LengthAtLeast(usize),
    Matches(&'static str),
    OneOf(&'static [&'static str]),
    RequiredIf {
        path: PathRef,
        value: &'static str,
    },
    ConflictsIf {
        path: PathRef,
        value: &'static str,
    },
    /// The field may not be set together with any of these siblings.
    ConflictsWith(&'static [&'static str]),
}

/// Validate a planned entity against its shape.
///
/// Reports every violation rather than stopping at the first one.
pub fn validate(registry: &Registry, root: &Value) -> Vec<Error> {
    let mut errors = Vec::new();
    if root.shape().is_none() {
        errors.push(Error::ConstraintViolation {
            path: ".".to_string(),
            message: "expected an object at the root".to_string(),
        });
        return errors;
    }
    let mut ctx = Ctx {
        root,
        errors: &mut errors,
        patterns: Patterns::global(),
    };

    // Pre-order walk, children pushed in reverse so violations come out in
    // field order.
    let mut pending: Vec<(&Value, String)> = vec![(root, String::new())];
    while let Some((node, path)) = pending.pop() {
        match node {
            Value::Object(shape_id, _) => {
                let Some(fields) = node.fields() else {
                    continue;
                };
                let shape = match registry.shape(*shape_id) {
                    Ok(s) => s,
                    Err(e) => {
                        ctx.errors.push(e);
                        continue;
                    }
                };
                ctx.check_fields(shape, fields, &path);
                for field in shape.fields.iter().rev() {
                    if let Some(child) = fields.get(field.name) {
                        pending.push((child, format!("{}.{}", path, field.name)));
                    }
                }
            }
            Value::List(_, _) | Value::Set(_, _) => {
                let items = node.elements().unwrap_or_default();
                for (i, item) in items.iter().enumerate().rev() {
                    pending.push((item, format!("{}[{}]", path, i)));
                }
            }
            _ => {}
        }
    }
    errors
}

/// Compiled `Matches` patterns, keyed by pattern text.
#[derive(Default)]
struct Patterns(Mutex<HashMap<&'static str, Regex>>);

impl Patterns {
    fn global() -> &'static Patterns {
        static GLOBAL: OnceLock<Patterns> = OnceLock::new();
        GLOBAL.get_or_init(Patterns::default)
    }

    fn get(&self, pattern: &'static str) -> Result<Regex, regex::Error> {
        let mut cache = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern)?;
        cache.insert(pattern, re.clone());
        Ok(re)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct Ctx<'a> {
    root: &'a Value,
    errors: &'a mut Vec<Error>,
    patterns: &'a Patterns,
}

impl<'a> Ctx<'a> {
    fn check_fields(&mut self, shape: &Shape, fields: &Fields, path: &str) {
        // Variant-level requirements, when the discriminator is known.
        if let Some(u) = &shape.union {
            if let Some(tag) = fields.get(u.discriminator).and_then(Value::as_str) {
                match shape.variant(tag) {
                    Some(variant) => {
                        for name in &variant.required {
                            if fields.get(*name).map_or(true, Value::is_null) {
                                self.violation(
                                    path,
                                    name,
                                    format!("must be set when {} is \"{}\"", u.discriminator, tag),
                                );
                            }
                        }
                        for name in &variant.conflicting {
                            if fields.get(*name).is_some_and(Value::is_known) {
                                self.violation(
                                    path,
                                    name,
                                    format!(
                                        "cannot be set when {} is \"{}\"",
                                        u.discriminator, tag
                                    ),
                                );
                            }
                        }
                    }
                    None => self.violation(
                        path,
                        u.discriminator,
                        format!("\"{}\" is not a recognised value", tag),
                    ),
                }
            }
        }

        for field in &shape.fields {
            let value = fields.get(field.name);
            if field.mode == FieldMode::Required && value.map_or(true, Value::is_null) {
                self.violation(path, field.name, "is required".to_string());
                continue;
            }
            let Some(value) = value else { continue };
            for c in &field.constraints {
                if let Some(message) = self.check(c, value, fields) {
                    self.violation(path, field.name, message);
                }
            }
        }
    }

    fn check(&self, c: &Constraint, value: &Value, siblings: &Fields) -> Option<String> {
        match c {
            Constraint::LengthAtLeast(min) => {
                let len = match value {
                    Value::String(_) => value.as_str().map(|s| s.chars().count()),
                    _ => value.elements().map(<[Value]>::len),
                }?;
                (len < *min).then(|| format!("must have a length of at least {}", min))
            }
            Constraint::Matches(pattern) => {
                let s = value.as_str()?;
                match self.patterns.get(*pattern) {
                    Ok(re) if re.is_match(s) => None,
                    Ok(_) => Some(format!("\"{}\" must match regex: {}", s, pattern)),
                    Err(e) => Some(format!("invalid pattern {}: {}", pattern, e)),
                }
            }
            Constraint::OneOf(allowed) => {
                let s = value.as_str()?;
                (!allowed.contains(&s))
                    .then(|| format!("\"{}\" must be one of: {}", s, allowed.join(", ")))
            }
            Constraint::RequiredIf { path, value: want } => {
                let actual = self.resolve(path, siblings)?;
                (actual == *want && value.is_null())
                    .then(|| format!("must be set when {} is \"{}\"", path.describe(), want))
            }
            Constraint::ConflictsIf { path, value: want } => {
                let actual = self.resolve(path, siblings)?;
                (actual == *want && value.is_known())
                    .then(|| format!("cannot be set when {} is \"{}\"", path.describe(), want))
            }
            Constraint::ConflictsWith(others) => {
                if !value.is_known() {
                    return None;
                }
                let clash: Vec<&str> = others
                    .iter()
                    .copied()
                    .filter(|o| siblings.get(*o).is_some_and(Value::is_known))
                    .collect();
                (!clash.is_empty()).then(|| format!("conflicts with {}", clash.join(", ")))
            }
        }
    }

    fn resolve<'b>(&'b self, path: &PathRef, siblings: &'b Fields) -> Option<&'b str> {
        match path {
            PathRef::Root(names) => self.root.get_path(names).and_then(Value::as_str),
            PathRef::Sibling(name) => siblings.get(*name).and_then(Value::as_str),
        }
    }

    fn violation(&mut self, path: &str, field: &str, message: String) {
        self.errors.push(Error::ConstraintViolation {
            path: crate::error::display_path(&format!("{}.{}", path, field)),
            message,
        });
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
