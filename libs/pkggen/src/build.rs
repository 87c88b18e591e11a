//! The external package-build tool.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::GenerateError;

/// Default build program.
pub const DEFAULT_BUILD_PROGRAM: &str = "python";

/// Default build arguments, run from the output root.
pub const DEFAULT_BUILD_ARGS: [&str; 3] = ["setup.py", "bdist_rpm", "--no-autoreq"];

/// What the build tool is asked to build.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    /// Directory holding the rendered sources; the build runs here.
    pub workdir: &'a Path,
    pub package_name: &'a str,
    pub version: &'a str,
}

/// Captured result of one build run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Builds a package from rendered sources.
pub trait BuildTool {
    /// Run one build to completion.
    ///
    /// Returns `Err` only if the tool could not be run; a tool that runs and
    /// fails reports it through [`BuildOutput::exit_code`].
    fn build(&self, request: &BuildRequest<'_>) -> Result<BuildOutput, GenerateError>;
}

/// Runs an external command such as `python setup.py bdist_rpm --no-autoreq`.
///
/// The call blocks until the command exits; no timeout is applied.
#[derive(Debug, Clone)]
pub struct CommandBuildTool {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandBuildTool {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for CommandBuildTool {
    fn default() -> Self {
        Self::new(
            DEFAULT_BUILD_PROGRAM,
            DEFAULT_BUILD_ARGS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl BuildTool for CommandBuildTool {
    fn build(&self, request: &BuildRequest<'_>) -> Result<BuildOutput, GenerateError> {
        debug!(
            program = %self.program.display(),
            args = ?self.args,
            workdir = %request.workdir.display(),
            package = request.package_name,
            "running build tool"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(request.workdir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| GenerateError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        Ok(BuildOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(dir: &Path) -> BuildRequest<'_> {
        BuildRequest {
            workdir: dir,
            package_name: "EXTR-lsbwrapper-1-1",
            version: "1.0",
        }
    }

    #[test]
    fn test_default_command() {
        let tool = CommandBuildTool::default();
        assert_eq!(tool.program(), Path::new("python"));
        assert_eq!(tool.args(), ["setup.py", "bdist_rpm", "--no-autoreq"]);
    }

    #[test]
    fn test_captures_output_and_status() {
        let dir = tempdir().unwrap();
        let tool = CommandBuildTool::new(
            "sh",
            vec!["-c".into(), "pwd; echo oops >&2; exit 3".into()],
        );

        let output = tool.build(&request(dir.path())).unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stderr.trim(), "oops");
        let pwd = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(output.stdout.trim(), pwd.display().to_string());
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let dir = tempdir().unwrap();
        let tool = CommandBuildTool::new("/nonexistent/build-tool", vec![]);
        let err = tool.build(&request(dir.path())).unwrap_err();
        assert!(matches!(err, GenerateError::Launch { .. }));
    }
}
