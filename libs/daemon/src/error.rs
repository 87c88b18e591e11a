//! Error types for the daemonizer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Daemonizer errors with stable reason codes.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The pidfile names a process that is still alive.
    #[error("already_running: pid {pid} from {}", pidfile.display())]
    AlreadyRunning { pid: i32, pidfile: PathBuf },

    /// The pidfile exists but does not hold a pid.
    #[error("invalid_pidfile: {}: {content:?}", path.display())]
    InvalidPidfile { path: PathBuf, content: String },

    /// fork, setsid, or another process-control call failed.
    #[error("syscall_failed: {call}: {source}")]
    Syscall {
        call: &'static str,
        #[source]
        source: nix::Error,
    },

    /// A file the daemon needs could not be opened or written.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The daemon working directory is missing or not a directory.
    #[error("not_a_directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// The daemon failed between forking and writing its pidfile.
    #[error("not_ready: {reason}")]
    NotReady { reason: String },

    /// The process did not exit after being signalled.
    #[error("stop_timeout: pid {pid} still running")]
    StopTimeout { pid: i32 },
}

impl DaemonError {
    pub(crate) fn syscall(call: &'static str) -> impl FnOnce(nix::Error) -> Self {
        move |source| DaemonError::Syscall { call, source }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| DaemonError::Io { path, source }
    }

    /// Short machine-readable code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            DaemonError::AlreadyRunning { .. } => "already_running",
            DaemonError::InvalidPidfile { .. } => "invalid_pidfile",
            DaemonError::Syscall { .. } => "syscall_failed",
            DaemonError::Io { .. } => "io_error",
            DaemonError::NotADirectory { .. } => "not_a_directory",
            DaemonError::NotReady { .. } => "not_ready",
            DaemonError::StopTimeout { .. } => "stop_timeout",
        }
    }
}
