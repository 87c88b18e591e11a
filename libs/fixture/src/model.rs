//! Typed view of a fixture document.
//!
//! Documents are validated against the schema before they are deserialized
//! into these types, so deserialization only fails on inputs the schema
//! accepts if the two drift apart.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FixtureError;
use crate::validate::FixtureValidator;

/// A fixture document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureDocument {
    /// Default property values.
    pub default: BTreeMap<String, String>,
    pub packages: Vec<Entity>,
    pub options: FixtureOptions,
    /// Clustered services.
    pub cs: Vec<Entity>,
    pub service: Vec<Entity>,
    #[serde(rename = "ha-service-config")]
    pub ha_service_config: Vec<Entity>,
    pub vip: Vec<Entity>,
}

/// Generation options recorded in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureOptions {
    pub story: String,
    pub cs_length: u64,
    pub app_length: u64,
    pub vip_length: u64,
}

/// One entity to create in the system under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    /// Location of the item in the deployment model, e.g. `/software/items/x`.
    pub vpath: String,
    /// `options` rendered as `key="value"` pairs for the product CLI.
    pub options_string: String,
    /// Whether the test should remove the item during cleanup.
    pub add_to_cleanup: bool,
    /// Id of the owning entity, for kinds that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub options: BTreeMap<String, String>,
    /// Free-form string properties.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Entity {
    /// Creates an entity, deriving `options_string` from `options`.
    pub fn new(
        id: impl Into<String>,
        vpath: impl Into<String>,
        parent: Option<String>,
        options: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            vpath: vpath.into(),
            options_string: options_string(&options),
            add_to_cleanup: true,
            parent,
            options,
            extra: BTreeMap::new(),
        }
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Renders options as space-separated `key="value"` pairs in key order.
pub fn options_string(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(key, value)| format!("{key}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

impl FixtureDocument {
    /// Validates `json` against the schema, then deserializes it.
    pub fn from_json_str(json: &str) -> Result<Self, FixtureError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        FixtureValidator::new()?.ensure_valid(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Reads and validates a fixture file.
    pub fn from_path(path: &Path) -> Result<Self, FixtureError> {
        let json = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, FixtureError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clustered service by id.
    pub fn clustered_service(&self, id: &str) -> Option<&Entity> {
        self.cs.iter().find(|cs| cs.id == id)
    }

    /// Services owned by a clustered service.
    pub fn services_of<'a>(&'a self, cs_id: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.service
            .iter()
            .filter(move |service| service.parent.as_deref() == Some(cs_id))
    }

    /// Every entity in creation order: packages, clustered services, services,
    /// HA configs, then VIPs.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.packages
            .iter()
            .chain(&self.cs)
            .chain(&self.service)
            .chain(&self.ha_service_config)
            .chain(&self.vip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_string_is_sorted_and_quoted() {
        let options = BTreeMap::from([
            ("standby".to_string(), "1".to_string()),
            ("active".to_string(), "1".to_string()),
            ("name".to_string(), "CS_1".to_string()),
        ]);
        assert_eq!(
            options_string(&options),
            r#"active="1" name="CS_1" standby="1""#
        );
    }

    #[test]
    fn test_entity_extra_fields_roundtrip() {
        let json = r#"{
            "id": "CS_1",
            "vpath": "/deployments/d1/clusters/c1/services/CS_1",
            "options_string": "",
            "add_to_cleanup": false,
            "options": {"active": "1", "standby": "0", "name": "cs1"},
            "node_list": "n1,n2"
        }"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.parent, None);
        assert_eq!(entity.extra.get("node_list").map(String::as_str), Some("n1,n2"));
        assert_eq!(entity.option("name"), Some("cs1"));

        let back = serde_json::to_value(&entity).unwrap();
        assert_eq!(back["node_list"], "n1,n2");
        assert!(back.get("parent").is_none());
    }
}
