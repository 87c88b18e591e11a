//! Schema validation for fixture documents.

use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

use crate::error::{FixtureError, ValidationIssue};

/// The fixture JSON Schema (draft-07).
pub const FIXTURE_SCHEMA: &str = include_str!("../schema/fixture.schema.json");

/// Top-level sections every fixture document must carry.
pub const REQUIRED_SECTIONS: [&str; 7] = [
    "default",
    "packages",
    "options",
    "cs",
    "service",
    "ha-service-config",
    "vip",
];

/// A compiled fixture schema.
pub struct FixtureValidator {
    validator: Validator,
}

impl FixtureValidator {
    /// Compiles the embedded schema.
    pub fn new() -> Result<Self, FixtureError> {
        let schema: Value = serde_json::from_str(FIXTURE_SCHEMA)
            .map_err(|e| FixtureError::Schema(e.to_string()))?;
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| FixtureError::Schema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// True if `document` satisfies the schema.
    pub fn is_valid(&self, document: &Value) -> bool {
        self.validator.is_valid(document)
    }

    /// Every schema violation in `document`; empty when valid.
    pub fn validate(&self, document: &Value) -> Vec<ValidationIssue> {
        let issues: Vec<ValidationIssue> = self
            .validator
            .iter_errors(document)
            .map(|error| ValidationIssue {
                message: error.to_string(),
            })
            .collect();
        debug!(issues = issues.len(), "fixture validated");
        issues
    }

    /// Like [`validate`](Self::validate), but as a `Result`.
    pub fn ensure_valid(&self, document: &Value) -> Result<(), FixtureError> {
        let issues = self.validate(document);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(FixtureError::Invalid { issues })
        }
    }
}

/// Parses `json` and lists its schema violations.
pub fn validate_fixture_str(json: &str) -> Result<Vec<ValidationIssue>, FixtureError> {
    let document: Value = serde_json::from_str(json)?;
    Ok(FixtureValidator::new()?.validate(&document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "default": {},
            "packages": [],
            "options": {"story": "1", "cs_length": 0, "app_length": 0, "vip_length": 0},
            "cs": [],
            "service": [],
            "ha-service-config": [],
            "vip": []
        })
    }

    fn clustered_service() -> Value {
        json!({
            "id": "CS_1_1",
            "vpath": "/deployments/d1/clusters/c1/services/CS_1_1",
            "options_string": "active=\"1\" name=\"cs1\" standby=\"1\"",
            "add_to_cleanup": true,
            "options": {"active": "1", "standby": "1", "name": "cs1"}
        })
    }

    #[test]
    fn test_schema_compiles() {
        FixtureValidator::new().unwrap();
    }

    #[test]
    fn test_minimal_document_passes() {
        let validator = FixtureValidator::new().unwrap();
        assert!(validator.is_valid(&minimal()));
        assert!(validator.validate(&minimal()).is_empty());
    }

    #[test]
    fn test_every_section_is_required() {
        let validator = FixtureValidator::new().unwrap();
        for section in REQUIRED_SECTIONS {
            let mut doc = minimal();
            doc.as_object_mut().unwrap().remove(section);
            assert!(!validator.is_valid(&doc), "missing {section} should fail");
        }
    }

    #[test]
    fn test_missing_packages_fails() {
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove("packages");
        let issues = FixtureValidator::new().unwrap().validate(&doc);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("packages"));
    }

    #[test]
    fn test_unexpected_top_level_key_fails() {
        let mut doc = minimal();
        doc["extra"] = json!([]);
        assert!(!FixtureValidator::new().unwrap().is_valid(&doc));
    }

    #[test]
    fn test_options_counters_must_be_non_negative_integers() {
        let validator = FixtureValidator::new().unwrap();

        let mut doc = minimal();
        doc["options"]["cs_length"] = json!(-1);
        assert!(!validator.is_valid(&doc));

        let mut doc = minimal();
        doc["options"]["vip_length"] = json!("2");
        assert!(!validator.is_valid(&doc));

        let mut doc = minimal();
        doc["options"].as_object_mut().unwrap().remove("story");
        assert!(!validator.is_valid(&doc));
    }

    #[test]
    fn test_clustered_service_shape() {
        let validator = FixtureValidator::new().unwrap();

        let mut doc = minimal();
        doc["cs"] = json!([clustered_service()]);
        assert!(validator.is_valid(&doc));

        // free-form options must be strings
        let mut cs = clustered_service();
        cs["options"]["node_list"] = json!("n1,n2");
        doc["cs"] = json!([cs.clone()]);
        assert!(validator.is_valid(&doc));
        cs["options"]["online_timeout"] = json!(180);
        doc["cs"] = json!([cs]);
        assert!(!validator.is_valid(&doc));

        // declared options are required strings
        let mut cs = clustered_service();
        cs["options"].as_object_mut().unwrap().remove("standby");
        doc["cs"] = json!([cs]);
        assert!(!validator.is_valid(&doc));

        // add_to_cleanup is a boolean
        let mut cs = clustered_service();
        cs["add_to_cleanup"] = json!("yes");
        doc["cs"] = json!([cs]);
        assert!(!validator.is_valid(&doc));

        // extra entity properties must be strings
        let mut cs = clustered_service();
        cs["dependency_list"] = json!(["CS_2"]);
        doc["cs"] = json!([cs]);
        assert!(!validator.is_valid(&doc));
    }

    #[test]
    fn test_child_entities_need_parent() {
        let validator = FixtureValidator::new().unwrap();
        let mut doc = minimal();
        doc["vip"] = json!([{
            "id": "VIP_1_1_1",
            "vpath": "/deployments/d1/clusters/c1/services/CS_1_1/ipaddresses/ip1_1",
            "options_string": "",
            "add_to_cleanup": true,
            "options": {"network_name": "traffic1", "ipaddress": "10.10.1.1"}
        }]);
        assert!(!validator.is_valid(&doc));

        doc["vip"][0]["parent"] = json!("APP_1_1");
        assert!(validator.is_valid(&doc));
    }

    #[test]
    fn test_validate_fixture_str_rejects_non_json() {
        assert!(matches!(
            validate_fixture_str("{not json"),
            Err(FixtureError::Json(_))
        ));
        assert!(validate_fixture_str(&minimal().to_string()).unwrap().is_empty());
    }
}
