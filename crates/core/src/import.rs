//! Import identifiers: slash-separated component paths such as
//! `environment_id/api_service_id/api_service_operation_id`.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::Error;

/// PingOne resource ID.
pub const RESOURCE_ID_PATTERN: &str = "[0-9a-fA-F-]{36}";

/// One slash-separated component of an import identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportComponent {
    pub label: &'static str,
    /// Unanchored pattern for this component.
    pub regex: &'static str,
    /// The primary component becomes the entity's `id`.
    pub primary: bool,
}

impl ImportComponent {
    pub const fn resource_id(label: &'static str) -> Self {
        ImportComponent {
            label,
            regex: RESOURCE_ID_PATTERN,
            primary: false,
        }
    }

    pub const fn primary(label: &'static str) -> Self {
        ImportComponent {
            label,
            regex: RESOURCE_ID_PATTERN,
            primary: true,
        }
    }
}

/// `environment_id/rule_id`
pub fn format(components: &[ImportComponent]) -> String {
    components
        .iter()
        .map(|c| c.label)
        .collect::<Vec<_>>()
        .join("/")
}

fn anchored(components: &[ImportComponent]) -> String {
    let parts: Vec<&str> = components.iter().map(|c| c.regex).collect();
    format!("^{}$", parts.join("/"))
}

/// Parse `id` against `components`.
///
/// The primary component's value is stored under `"id"`, every other
/// component under its label.
pub fn parse(components: &[ImportComponent], id: &str) -> Result<BTreeMap<String, String>, Error> {
    let pattern = anchored(components);
    let rejected = || Error::UnexpectedImportIdentifier {
        id: id.to_string(),
        format: format(components),
        regex: pattern.clone(),
    };

    let re = Regex::new(&pattern).map_err(|_| rejected())?;
    if !re.is_match(id) {
        return Err(rejected());
    }

    let values: Vec<&str> = id.splitn(components.len(), '/').collect();
    if values.len() != components.len() {
        return Err(rejected());
    }

    Ok(components
        .iter()
        .zip(values)
        .map(|(c, v)| {
            let key = if c.primary { "id" } else { c.label };
            (key.to_string(), v.to_string())
        })
        .collect())
}

/// Inverse of [`parse`]: join the component values of a state back into
/// an import identifier. `None` when a component is missing.
pub fn compose(components: &[ImportComponent], values: &BTreeMap<String, String>) -> Option<String> {
    let parts = components
        .iter()
        .map(|c| {
            let key = if c.primary { "id" } else { c.label };
            values.get(key).map(String::as_str)
        })
        .collect::<Option<Vec<&str>>>()?;
    Some(parts.join("/"))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
