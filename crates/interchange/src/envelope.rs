//! The common envelope every entity document carries:
//! `{ id, environment: {id}, version, name, fullName, description, parent: {id} }`.

use p1authz_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<IdRef>,
}

impl Envelope {
    /// Read the envelope of a wire document, ignoring variant fields.
    pub fn from_wire(wire: &Json) -> Result<Self, Error> {
        Envelope::deserialize(wire).map_err(|e| Error::InvalidValue {
            path: ".".to_string(),
            message: format!("malformed envelope: {}", e),
        })
    }

    pub fn environment_id(&self) -> Option<&str> {
        self.environment.as_ref().map(|e| e.id.as_str())
    }
}

/// Stamp `id` and `version` onto an outgoing document.
///
/// Update bodies must carry the version that was read immediately before
/// the write.
pub fn stamp(wire: &mut Json, id: Option<&str>, version: Option<&str>) {
    let Some(obj) = wire.as_object_mut() else {
        return;
    };
    if let Some(id) = id {
        obj.insert("id".to_string(), Json::String(id.to_string()));
    }
    if let Some(version) = version {
        obj.insert("version".to_string(), Json::String(version.to_string()));
    }
}
