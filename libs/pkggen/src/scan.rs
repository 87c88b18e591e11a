//! Discovery of packages already present in the output directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::GenerateError;
use crate::kind::PackageKind;
use crate::request::{PackageVersion, StoryId};

/// Directory under the output root where the build tool leaves packages.
pub const DIST_DIR: &str = "dist";

/// Suffixes of intermediate build products removed after a successful build.
pub const INTERMEDIATE_SUFFIXES: [&str; 2] = [".tar.gz", ".src.rpm"];

/// A final package found in `dist/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingPackage {
    pub sequence: u32,
    pub version: PackageVersion,
    pub path: PathBuf,
}

/// The packages of one kind and story found on disk, at any version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub packages: Vec<ExistingPackage>,
}

impl ScanResult {
    /// Distinct sequence numbers present.
    pub fn sequences(&self) -> BTreeSet<u32> {
        self.packages.iter().map(|p| p.sequence).collect()
    }

    /// Sequence numbers that have a package at `version`.
    pub fn sequences_at(&self, version: &PackageVersion) -> BTreeSet<u32> {
        self.packages
            .iter()
            .filter(|p| &p.version == version)
            .map(|p| p.sequence)
            .collect()
    }

    /// Number of distinct sequence numbers present.
    pub fn count(&self) -> usize {
        self.sequences().len()
    }

    /// Highest sequence number present, or 0.
    pub fn max_sequence(&self) -> u32 {
        self.sequences().last().copied().unwrap_or(0)
    }
}

/// Lists final packages in `<output_root>/dist` for a kind and story.
///
/// Every version counts: a sequence rebuilt at a newer version is still one
/// sequence. A missing `dist/` directory means nothing has been built yet.
pub fn scan_dist(
    output_root: &Path,
    kind: PackageKind,
    story: &StoryId,
) -> Result<ScanResult, GenerateError> {
    let dist = output_root.join(DIST_DIR);
    if !dist.is_dir() {
        return Ok(ScanResult::default());
    }

    let stem = format!("{}-{}-", kind.name_prefix(), story);
    let mut packages = Vec::new();

    for entry in WalkDir::new(&dist).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dist.clone());
            GenerateError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some((sequence, version)) = match_final_package(file_name, &stem) {
            packages.push(ExistingPackage {
                sequence,
                version,
                path: entry.into_path(),
            });
        }
    }

    packages.sort_by(|a, b| {
        a.sequence
            .cmp(&b.sequence)
            .then_with(|| a.version.as_str().cmp(b.version.as_str()))
    });
    Ok(ScanResult { packages })
}

/// Returns the sequence number and version if `file_name` is
/// `<stem><sequence>-<version>-<release>.<arch>.rpm` and not a source package.
fn match_final_package(file_name: &str, stem: &str) -> Option<(u32, PackageVersion)> {
    if !file_name.ends_with(".rpm") || file_name.ends_with(".src.rpm") {
        return None;
    }
    let rest = file_name.strip_prefix(stem)?;
    let (sequence, rest) = rest.split_once('-')?;
    if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (version, _release) = rest.split_once('-')?;
    let version = PackageVersion::parse(version).ok()?;
    Some((sequence.parse().ok()?, version))
}

/// True if `file_name` is an intermediate build product.
pub fn is_intermediate(file_name: &str) -> bool {
    INTERMEDIATE_SUFFIXES
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
}
