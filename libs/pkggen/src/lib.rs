//! # vcsfx-pkggen
//!
//! Generates LSB wrapper packages used as synthetic payload by the cluster
//! integration tests.
//!
//! A [`Generator`] renders an init script, a systemd unit and a `setup.py`
//! for each missing package, runs the package build tool in the output root,
//! and cleans up everything except the final `dist/*.noarch.rpm`.
//!
//! ```ignore
//! let templates = EmbeddedTemplates::new()?;
//! let generator = Generator::new(templates, CommandBuildTool::default(), "/var/tmp/rpms");
//! let request = PackageRequest::new(StoryId::from(1234), 3, None, PackageKind::Http)?;
//! let report = generator.generate_rpms(&request)?;
//! assert!(report.is_complete());
//! ```
//!
//! ## Layout produced
//!
//! ```text
//! <output>/dist/EXTR-lsbwrapper[-fail|-http|-delay]-<story>-<seq>-<version>-1.noarch.rpm
//! ```
//!
//! Rendered sources, `MANIFEST` and `build/` only survive a failed build.

mod build;
mod config;
mod error;
mod generator;
mod kind;
mod request;
mod scan;
mod templates;

pub use build::{
    BuildOutput, BuildRequest, BuildTool, CommandBuildTool, DEFAULT_BUILD_ARGS,
    DEFAULT_BUILD_PROGRAM,
};
pub use config::{GeneratorConfig, SurplusPolicy};
pub use error::{ConfigError, GenerateError, PackageError};
pub use generator::{
    plan_sequences, BuildOutcome, BuiltPackage, FailedBuild, GenerationReport, Generator,
    BUILD_DIR, MANIFEST_FILE, SETUP_FILE,
};
pub use kind::{PackageKind, PACKAGE_BASE};
pub use request::{validate_version, PackageRequest, PackageVersion, StoryId, DEFAULT_VERSION};
pub use scan::{is_intermediate, scan_dist, ExistingPackage, ScanResult, DIST_DIR};
pub use templates::{
    EmbeddedTemplates, TemplateProvider, TemplateVars, HTTP_BASE_PORT, SETUP_TEMPLATE,
    STOP_DELAY_SECS, UNIT_TEMPLATE,
};
