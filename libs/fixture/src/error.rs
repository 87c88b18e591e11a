//! Error types for fixture documents.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Fixture errors.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The embedded schema failed to compile.
    #[error("fixture schema is invalid: {0}")]
    Schema(String),

    /// The input is not JSON.
    #[error("invalid fixture JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document does not satisfy the schema.
    #[error("fixture failed validation ({} issue(s)): {}", .issues.len(), summarize(.issues))]
    Invalid { issues: Vec<ValidationIssue> },

    /// The fixture file could not be read or written.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues {
        [] => String::new(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
    }
}
