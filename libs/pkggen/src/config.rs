//! Generator configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file, then `VCSFX_*` environment variables. Callers layer CLI flags on
//! top of the result.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::build::{CommandBuildTool, DEFAULT_BUILD_ARGS, DEFAULT_BUILD_PROGRAM};
use crate::error::ConfigError;
use crate::request::PackageVersion;

/// What to do when at least the requested number of packages already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurplusPolicy {
    /// Build nothing; the request is already satisfied.
    #[default]
    Skip,
    /// Build `count` further packages after the highest existing sequence.
    ///
    /// Keeps adding packages on every call once the requested count has been
    /// reached.
    LegacyAdditive,
}

impl FromStr for SurplusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(SurplusPolicy::Skip),
            "legacy-additive" => Ok(SurplusPolicy::LegacyAdditive),
            other => Err(format!(
                "expected 'skip' or 'legacy-additive', got '{other}'"
            )),
        }
    }
}

/// Generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Output root; packages land in `<output_dir>/dist`.
    pub output_dir: PathBuf,

    /// Build program, run from the output root.
    pub build_program: PathBuf,

    /// Arguments passed to the build program.
    pub build_args: Vec<String>,

    /// Version used when a request does not name one.
    pub default_version: PackageVersion,

    pub surplus: SurplusPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            build_program: PathBuf::from(DEFAULT_BUILD_PROGRAM),
            build_args: DEFAULT_BUILD_ARGS.iter().map(|s| s.to_string()).collect(),
            default_version: PackageVersion::default(),
            surplus: SurplusPolicy::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|var| std::env::var(var).ok())
    }

    /// Parse a TOML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply `VCSFX_*` overrides read through `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("VCSFX_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }

        if let Some(program) = lookup("VCSFX_BUILD_PROGRAM") {
            self.build_program = PathBuf::from(program);
        }

        if let Some(version) = lookup("VCSFX_DEFAULT_VERSION") {
            self.default_version = version.parse()?;
        }

        if let Some(surplus) = lookup("VCSFX_SURPLUS") {
            self.surplus = surplus
                .parse()
                .map_err(|reason| ConfigError::InvalidEnv {
                    var: "VCSFX_SURPLUS",
                    reason,
                })?;
        }

        Ok(self)
    }

    /// The build tool described by this config.
    pub fn build_tool(&self) -> CommandBuildTool {
        CommandBuildTool::new(&self.build_program, self.build_args.clone())
    }
}
