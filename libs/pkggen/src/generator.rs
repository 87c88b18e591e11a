//! Reconciles the packages on disk against a request.
//!
//! Each call runs scan -> plan -> (render -> build -> clean) per missing
//! package. The scan and the builds are not atomic: two generators sharing an
//! output directory and story race on sequence numbers and on `setup.py`.

use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::build::{BuildRequest, BuildTool};
use crate::config::SurplusPolicy;
use crate::error::GenerateError;
use crate::kind::PackageKind;
use crate::request::{PackageRequest, PackageVersion, StoryId};
use crate::scan::{is_intermediate, scan_dist, ScanResult, DIST_DIR};
use crate::templates::{TemplateProvider, TemplateVars, SETUP_TEMPLATE, UNIT_TEMPLATE};

/// Build script rendered into the output root.
pub const SETUP_FILE: &str = "setup.py";

/// File list written by the build tool.
pub const MANIFEST_FILE: &str = "MANIFEST";

/// Scratch directory used by the build tool.
pub const BUILD_DIR: &str = "build";

/// Executable bits for owner, group and other.
const EXEC_BITS: u32 = 0o111;

/// A package that was built successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltPackage {
    pub sequence: u32,
    pub package_name: String,
    /// Final package files left in `dist/`.
    pub files: Vec<PathBuf>,
}

/// A package whose build tool exited unsuccessfully.
///
/// The rendered sources are left in the output root for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBuild {
    pub sequence: u32,
    pub package_name: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

/// Result of building a single package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Built(BuiltPackage),
    Failed(FailedBuild),
}

impl BuildOutcome {
    pub fn is_built(&self) -> bool {
        matches!(self, BuildOutcome::Built(_))
    }
}

/// Summary of one `generate_rpms` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub story: StoryId,
    pub kind: PackageKind,
    pub version: PackageVersion,
    pub requested: u32,
    /// Sequence numbers that were already on disk.
    pub existing: Vec<u32>,
    pub built: Vec<BuiltPackage>,
    pub failed: Vec<FailedBuild>,
}

impl GenerationReport {
    /// True if every attempted build succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Packages on disk after the call.
    pub fn total(&self) -> usize {
        self.existing.len() + self.built.len()
    }
}

/// Sequence numbers to build, given what is on disk.
///
/// Below the requested count, the deficit is filled after the highest
/// existing sequence. At or above it, `policy` decides. Fails only when
/// something has to be built and the numbers would pass `u32::MAX`.
pub fn plan_sequences(
    found: usize,
    max_sequence: u32,
    count: u32,
    policy: SurplusPolicy,
) -> Result<RangeInclusive<u32>, GenerateError> {
    let to_build = if found < count as usize {
        count - found as u32
    } else {
        match policy {
            SurplusPolicy::Skip => 0,
            SurplusPolicy::LegacyAdditive => count,
        }
    };

    if to_build == 0 {
        return Ok(1..=0);
    }

    max_sequence
        .checked_add(to_build)
        .map(|last| max_sequence + 1..=last)
        .ok_or(GenerateError::SequenceExhausted {
            max_sequence,
            requested: to_build,
        })
}

/// Generates LSB wrapper packages into an output directory.
pub struct Generator<T, B> {
    templates: T,
    build_tool: B,
    output_dir: PathBuf,
    surplus: SurplusPolicy,
}

impl<T: TemplateProvider, B: BuildTool> Generator<T, B> {
    pub fn new(templates: T, build_tool: B, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates,
            build_tool,
            output_dir: output_dir.into(),
            surplus: SurplusPolicy::default(),
        }
    }

    /// Set what happens when enough packages already exist.
    pub fn with_surplus_policy(mut self, surplus: SurplusPolicy) -> Self {
        self.surplus = surplus;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.output_dir.join(DIST_DIR)
    }

    pub fn build_tool(&self) -> &B {
        &self.build_tool
    }

    /// Final packages already on disk for a kind and story, at any version.
    pub fn scan(&self, kind: PackageKind, story: &StoryId) -> Result<ScanResult, GenerateError> {
        scan_dist(&self.output_dir, kind, story)
    }

    /// Builds whatever is missing to satisfy `request`.
    ///
    /// Existing packages are never re-rendered. A failed build does not stop
    /// the remaining ones; check [`GenerationReport::is_complete`].
    pub fn generate_rpms(
        &self,
        request: &PackageRequest,
    ) -> Result<GenerationReport, GenerateError> {
        let existing = self.scan(request.kind, &request.story)?;
        let sequences = plan_sequences(
            existing.count(),
            existing.max_sequence(),
            request.count,
            self.surplus,
        )?;

        info!(
            story = %request.story,
            kind = %request.kind,
            version = %request.version,
            requested = request.count,
            found = existing.count(),
            to_build = sequences.clone().count(),
            "reconciling packages"
        );

        let mut report = GenerationReport {
            story: request.story.clone(),
            kind: request.kind,
            version: request.version.clone(),
            requested: request.count,
            existing: existing.sequences().into_iter().collect(),
            built: Vec::new(),
            failed: Vec::new(),
        };

        self.build_all(&mut report, sequences)?;
        Ok(report)
    }

    /// Rebuilds every sequence of `kind` and `story` already on disk at
    /// `version`, keeping the package names.
    ///
    /// This is how flaky failing packages are replaced by the stable variant
    /// ahead of an upgrade. Sequences that already have a package at
    /// `version` are reported as existing and left alone. Nothing new is
    /// numbered, so the story keeps the same count.
    pub fn upgrade_rpms(
        &self,
        kind: PackageKind,
        story: &StoryId,
        version: &PackageVersion,
    ) -> Result<GenerationReport, GenerateError> {
        let found = self.scan(kind, story)?;
        let current = found.sequences_at(version);
        let stale: Vec<u32> = found.sequences().difference(&current).copied().collect();

        info!(
            story = %story,
            kind = %kind,
            version = %version,
            found = found.count(),
            to_build = stale.len(),
            "upgrading packages"
        );

        let mut report = GenerationReport {
            story: story.clone(),
            kind,
            version: version.clone(),
            requested: found.count() as u32,
            existing: current.into_iter().collect(),
            built: Vec::new(),
            failed: Vec::new(),
        };

        self.build_all(&mut report, stale)?;
        Ok(report)
    }

    fn build_all(
        &self,
        report: &mut GenerationReport,
        sequences: impl IntoIterator<Item = u32>,
    ) -> Result<(), GenerateError> {
        for sequence in sequences {
            match self.generate_rpm(report.kind, &report.story, sequence, &report.version)? {
                BuildOutcome::Built(built) => report.built.push(built),
                BuildOutcome::Failed(failed) => report.failed.push(failed),
            }
        }

        if !report.is_complete() {
            warn!(
                story = %report.story,
                failed = report.failed.len(),
                built = report.built.len(),
                "some package builds failed"
            );
        }
        Ok(())
    }

    /// Renders and builds one package.
    pub fn generate_rpm(
        &self,
        kind: PackageKind,
        story: &StoryId,
        sequence: u32,
        version: &PackageVersion,
    ) -> Result<BuildOutcome, GenerateError> {
        let vars = TemplateVars::for_artifact(kind, story, sequence, version)?;

        // Render everything before touching the disk.
        let unit = self.templates.render(UNIT_TEMPLATE, &vars)?;
        let script = self.templates.render(kind.script_template(), &vars)?;
        let setup = self.templates.render(SETUP_TEMPLATE, &vars)?;

        fs::create_dir_all(&self.output_dir)
            .map_err(|e| GenerateError::io(&self.output_dir, e))?;

        let unit_path = self.output_dir.join(&vars.unit_file);
        let script_path = self.output_dir.join(&vars.script_file);
        let setup_path = self.output_dir.join(SETUP_FILE);

        write_file(&unit_path, &unit)?;
        write_file(&script_path, &script)?;
        write_file(&setup_path, &setup)?;
        mark_executable(&script_path)?;
        mark_executable(&unit_path)?;

        debug!(package = %vars.package_name, "rendered package sources");

        let output = self.build_tool.build(&BuildRequest {
            workdir: &self.output_dir,
            package_name: &vars.package_name,
            version: &vars.version,
        })?;

        if !output.success() {
            error!(
                package = %vars.package_name,
                exit_code = ?output.exit_code,
                stderr = %output.stderr,
                "package build failed"
            );
            return Ok(BuildOutcome::Failed(FailedBuild {
                sequence,
                package_name: vars.package_name,
                exit_code: output.exit_code,
                stderr: output.stderr,
            }));
        }

        debug!(package = %vars.package_name, stdout = %output.stdout, "package build output");

        for path in [&script_path, &unit_path, &setup_path] {
            remove_file_if_exists(path)?;
        }
        remove_file_if_exists(&self.output_dir.join(MANIFEST_FILE))?;
        remove_dir_if_exists(&self.output_dir.join(BUILD_DIR))?;
        self.remove_intermediates()?;

        let files = self.final_files(&vars.package_name, &vars.version)?;
        info!(package = %vars.package_name, files = files.len(), "package built");

        Ok(BuildOutcome::Built(BuiltPackage {
            sequence,
            package_name: vars.package_name,
            files,
        }))
    }

    /// Removes source tarballs and source packages from `dist/`.
    fn remove_intermediates(&self) -> Result<(), GenerateError> {
        for path in self.dist_files()? {
            let intermediate = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(is_intermediate);
            if intermediate {
                remove_file_if_exists(&path)?;
            }
        }
        Ok(())
    }

    /// Final package files in `dist/` for one package name and version.
    fn final_files(&self, package_name: &str, version: &str) -> Result<Vec<PathBuf>, GenerateError> {
        let prefix = format!("{package_name}-{version}-");
        let mut files: Vec<PathBuf> = self
            .dist_files()?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".rpm"))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn dist_files(&self) -> Result<Vec<PathBuf>, GenerateError> {
        let dist = self.dist_dir();
        if !dist.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dist).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| GenerateError::io(&dist, e.into()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), GenerateError> {
    fs::write(path, contents).map_err(|e| GenerateError::io(path, e))
}

/// ORs the executable bits into the file's existing mode.
fn mark_executable(path: &Path) -> Result<(), GenerateError> {
    let mut permissions = fs::metadata(path)
        .map_err(|e| GenerateError::io(path, e))?
        .permissions();
    permissions.set_mode(permissions.mode() | EXEC_BITS);
    fs::set_permissions(path, permissions).map_err(|e| GenerateError::io(path, e))
}

fn remove_file_if_exists(path: &Path) -> Result<(), GenerateError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GenerateError::io(path, e)),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), GenerateError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GenerateError::io(path, e)),
    }
}
