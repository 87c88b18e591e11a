//! Error types for package requests and generation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while validating the pieces of a package request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// The story identifier is empty.
    #[error("story cannot be empty")]
    EmptyStory,

    /// The story identifier contains a character that cannot appear in a package name.
    #[error("invalid story '{story}': only ASCII letters, digits and '_' are allowed")]
    InvalidStory { story: String },

    /// The version string does not match `N.N` or `N.N.N`.
    #[error("invalid version '{version}': expected two or three dot-separated numbers")]
    InvalidVersion { version: String },

    /// The requested package count is zero.
    #[error("package count must be at least 1")]
    ZeroCount,

    /// The kind name is not one of the recognized selectors.
    #[error("unknown package kind '{0}'")]
    UnknownKind(String),
}

/// Errors raised while rendering or building a package.
///
/// A build tool that runs and exits non-zero is not an error; it is reported
/// through [`crate::BuildOutcome::Failed`].
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The request was malformed.
    #[error(transparent)]
    Request(#[from] PackageError),

    /// A template failed to render.
    #[error("failed to render template '{name}': {source}")]
    Template {
        name: &'static str,
        #[source]
        source: minijinja::Error,
    },

    /// The build tool could not be started at all.
    #[error("failed to launch build tool '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The packages to build would need sequence numbers above `u32::MAX`.
    #[error("no sequence numbers left: {requested} package(s) needed after {max_sequence}")]
    SequenceExhausted { max_sequence: u32, requested: u32 },

    /// An HTTP package's port would fall outside the TCP port range.
    #[error("sequence {sequence} is too large for an HTTP package port")]
    PortOutOfRange { sequence: u32 },

    /// Filesystem error on a specific path.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GenerateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the error came from request validation.
    pub fn is_request_error(&self) -> bool {
        matches!(self, GenerateError::Request(_))
    }
}

/// Errors raised while loading generator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// An environment variable held an unusable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    /// A configured value failed validation.
    #[error(transparent)]
    Invalid(#[from] PackageError),
}
