//! Fixture documents for cluster integration tests.
//!
//! A fixture describes the packages, clustered services, applications, HA
//! configs, and virtual IPs a test creates before it runs. This crate holds
//! the schema those documents must satisfy, a typed model of them, and a
//! builder producing deterministic, schema-valid documents.

pub mod builder;
pub mod error;
pub mod model;
pub mod validate;

pub use builder::FixtureBuilder;
pub use error::{FixtureError, ValidationIssue};
pub use model::{options_string, Entity, FixtureDocument, FixtureOptions};
pub use validate::{validate_fixture_str, FixtureValidator, FIXTURE_SCHEMA, REQUIRED_SECTIONS};
