//! Validated request types: story ids, versions and package requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PackageError;
use crate::kind::PackageKind;

/// Version used when a request does not name one.
pub const DEFAULT_VERSION: &str = "1.0";

/// Identifier grouping the artifacts generated for one story.
///
/// Story ids are embedded in package and file names, so only ASCII
/// alphanumerics and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoryId(String);

impl StoryId {
    /// Parses a story id from a string.
    pub fn parse(s: &str) -> Result<Self, PackageError> {
        if s.is_empty() {
            return Err(PackageError::EmptyStory);
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PackageError::InvalidStory {
                story: s.to_string(),
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Builds a story id from anything printable, e.g. a numeric ticket id.
    pub fn from_display(value: impl fmt::Display) -> Result<Self, PackageError> {
        Self::parse(&value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoryId {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoryId {
    type Error = PackageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoryId> for String {
    fn from(id: StoryId) -> Self {
        id.0
    }
}

impl From<u32> for StoryId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

/// A package version of the form `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion(String);

impl PackageVersion {
    /// Parses and validates a version string.
    pub fn parse(s: &str) -> Result<Self, PackageError> {
        validate_version(s)?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PackageVersion {
    fn default() -> Self {
        Self(DEFAULT_VERSION.to_string())
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageVersion {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = PackageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PackageVersion> for String {
    fn from(version: PackageVersion) -> Self {
        version.0
    }
}

/// Checks that `s` is two or three dot-separated runs of ASCII digits.
pub fn validate_version(s: &str) -> Result<(), PackageError> {
    let parts: Vec<&str> = s.split('.').collect();
    let well_formed = (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));

    if well_formed {
        Ok(())
    } else {
        Err(PackageError::InvalidVersion {
            version: s.to_string(),
        })
    }
}

/// A request for `count` packages of one kind for one story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    pub story: StoryId,
    pub count: u32,
    pub version: PackageVersion,
    pub kind: PackageKind,
}

impl PackageRequest {
    /// Creates a request, rejecting a zero count.
    pub fn new(
        story: StoryId,
        count: u32,
        version: Option<PackageVersion>,
        kind: PackageKind,
    ) -> Result<Self, PackageError> {
        if count == 0 {
            return Err(PackageError::ZeroCount);
        }
        Ok(Self {
            story,
            count,
            version: version.unwrap_or_default(),
            kind,
        })
    }
}
