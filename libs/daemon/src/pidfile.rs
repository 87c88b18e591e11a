//! Pidfile handling.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::error::DaemonError;

/// Mode for newly written pidfiles.
pub const PIDFILE_MODE: u32 = 0o644;

/// Reads the pid recorded in `path`, or `None` if the file does not exist.
pub fn read_pidfile(path: &Path) -> Result<Option<i32>, DaemonError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DaemonError::io(path)(e)),
    };

    match content.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(Some(pid)),
        _ => Err(DaemonError::InvalidPidfile {
            path: path.to_path_buf(),
            content,
        }),
    }
}

/// Writes `pid` followed by a newline, replacing any previous content.
pub fn write_pidfile(path: &Path, pid: i32) -> Result<(), DaemonError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(PIDFILE_MODE)
        .open(path)
        .map_err(DaemonError::io(path))?;
    writeln!(file, "{pid}").map_err(DaemonError::io(path))?;
    debug!(pid, pidfile = %path.display(), "pidfile written");
    Ok(())
}

/// Removes the pidfile. A missing file is not an error.
pub fn remove_pidfile(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DaemonError::io(path)(e)),
    }
}

/// True if a process with this pid exists, even one we may not signal.
pub fn is_running(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Fails if the pidfile names a live process; clears it if the process is gone.
pub fn ensure_not_running(path: &Path) -> Result<(), DaemonError> {
    let Some(pid) = read_pidfile(path)? else {
        return Ok(());
    };

    if is_running(pid) {
        return Err(DaemonError::AlreadyRunning {
            pid,
            pidfile: path.to_path_buf(),
        });
    }

    warn!(pid, pidfile = %path.display(), "removing stale pidfile");
    remove_pidfile(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_missing_pidfile_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_pidfile(&dir.path().join("none.pid")).unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.pid");
        write_pidfile(&path, 4321).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "4321\n");
        assert_eq!(read_pidfile(&path).unwrap(), Some(4321));
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & !PIDFILE_MODE, 0);
    }

    #[test]
    fn test_garbage_pidfile_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.pid");
        for content in ["", "abc\n", "-4\n", "0"] {
            fs::write(&path, content).unwrap();
            let err = read_pidfile(&path).unwrap_err();
            assert_eq!(err.reason_code(), "invalid_pidfile", "{content:?}");
        }
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.pid");
        write_pidfile(&path, 1).unwrap();
        remove_pidfile(&path).unwrap();
        remove_pidfile(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_own_process_is_running() {
        assert!(is_running(std::process::id() as i32));
    }

    #[test]
    fn test_live_pid_blocks_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.pid");
        write_pidfile(&path, std::process::id() as i32).unwrap();

        let err = ensure_not_running(&path).unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning { .. }));
        assert!(path.exists());
    }

    #[test]
    fn test_stale_pidfile_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.pid");

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        write_pidfile(&path, pid).unwrap();

        ensure_not_running(&path).unwrap();
        assert!(!path.exists());
    }
}
