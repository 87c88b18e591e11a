//! Test doubles for the vcsfx crates.
//!
//! [`ScriptedBuildTool`] stands in for `python setup.py bdist_rpm` and writes
//! the same files a real run leaves behind. [`TestRoot`] is a scratch output
//! directory with helpers for asserting on what is left in it.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use vcsfx_pkggen::{
    BuildOutput, BuildRequest, BuildTool, GenerateError, BUILD_DIR, DIST_DIR, MANIFEST_FILE,
};

/// Exit code reported for scripted failures (rpmbuild's usual code).
pub const SCRIPTED_FAILURE_EXIT: i32 = 1;

/// A build tool that fakes `bdist_rpm` output on disk.
///
/// Successful builds leave `MANIFEST`, `build/`, and in `dist/` a source
/// tarball, a source package and a `noarch` package. Failing builds leave a
/// partial `build/` and nothing in `dist/`.
#[derive(Debug, Default)]
pub struct ScriptedBuildTool {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBuildTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make builds of `package_name` exit non-zero.
    pub fn failing_for(mut self, package_name: impl Into<String>) -> Self {
        self.failing.insert(package_name.into());
        self
    }

    /// Package names built so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn write(path: &Path, contents: &[u8]) -> Result<(), GenerateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        fs::write(path, contents).map_err(|source| io_error(path, source))
    }
}

impl BuildTool for ScriptedBuildTool {
    fn build(&self, request: &BuildRequest<'_>) -> Result<BuildOutput, GenerateError> {
        self.calls
            .lock()
            .unwrap()
            .push(request.package_name.to_string());

        let workdir = request.workdir;
        let base = format!("{}-{}", request.package_name, request.version);
        let build = workdir.join(BUILD_DIR).join("bdist.linux-x86_64").join("rpm");

        if self.failing.contains(request.package_name) {
            Self::write(&build.join("SPECS").join(format!("{}.spec", request.package_name)), b"")?;
            return Ok(BuildOutput {
                exit_code: Some(SCRIPTED_FAILURE_EXIT),
                stdout: "running bdist_rpm\n".to_string(),
                stderr: format!("error: Bad exit status from rpmbuild for {base}\n"),
            });
        }

        let dist = workdir.join(DIST_DIR);
        Self::write(&workdir.join(MANIFEST_FILE), b"setup.py\n")?;
        Self::write(&build.join("SOURCES").join(format!("{base}.tar.gz")), b"")?;
        Self::write(&dist.join(format!("{base}.tar.gz")), b"sdist")?;
        Self::write(&dist.join(format!("{base}-1.src.rpm")), b"srpm")?;
        Self::write(&dist.join(format!("{base}-1.noarch.rpm")), b"rpm")?;

        Ok(BuildOutput {
            exit_code: Some(0),
            stdout: format!("running bdist_rpm\nmoving build/bdist.linux-x86_64/rpm/RPMS/noarch/{base}-1.noarch.rpm -> dist\n"),
            stderr: String::new(),
        })
    }
}

fn io_error(path: &Path, source: io::Error) -> GenerateError {
    GenerateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A temporary output root.
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn dist(&self) -> PathBuf {
        self.path().join(DIST_DIR)
    }

    /// Sorted names of the entries directly under the root.
    pub fn root_entries(&self) -> Vec<String> {
        list(self.path())
    }

    /// Sorted names of the files in `dist/`, empty if it does not exist.
    pub fn dist_entries(&self) -> Vec<String> {
        list(&self.dist())
    }

    /// `dist/` entries that are final (`noarch`) packages.
    pub fn final_packages(&self) -> Vec<String> {
        self.dist_entries()
            .into_iter()
            .filter(|name| name.ends_with(".noarch.rpm"))
            .collect()
    }

    /// Creates an empty file in `dist/`, e.g. a package from an earlier run.
    pub fn touch_dist(&self, name: &str) {
        fs::create_dir_all(self.dist()).unwrap();
        fs::write(self.dist().join(name), b"").unwrap();
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

fn list(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
