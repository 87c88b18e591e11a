//! The double fork.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::{umask, Mode};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{chdir, fork, getpid, pipe, setsid, ForkResult, Pid};
use tracing::{debug, info};

use crate::error::DaemonError;
use crate::pidfile::{ensure_not_running, is_running, read_pidfile, remove_pidfile, write_pidfile};

const DEV_NULL: &str = "/dev/null";
const STOP_POLL: Duration = Duration::from_millis(100);

/// Written by the daemon to the readiness pipe once its pidfile exists.
const READY: &[u8] = b"ready";

/// Which side of [`Daemon::start`] the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The invoking process. The daemon has been launched.
    Parent,
    /// The detached daemon process.
    Daemon,
}

/// Result of [`stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No pidfile, or it named a process that had already exited.
    NotRunning,
    Stopped { pid: i32 },
}

/// Detaches the current process from its terminal and session.
#[derive(Debug, Clone)]
pub struct Daemon {
    pidfile: PathBuf,
    working_dir: PathBuf,
    umask: u32,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
}

impl Daemon {
    /// A daemon recording its pid in `pidfile`, running in `/` with umask 0.
    pub fn new(pidfile: impl Into<PathBuf>) -> Self {
        Self {
            pidfile: pidfile.into(),
            working_dir: PathBuf::from("/"),
            umask: 0,
            stdout: None,
            stderr: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn umask(mut self, mask: u32) -> Self {
        self.umask = mask;
        self
    }

    /// Append daemon stdout to `path` instead of discarding it.
    pub fn stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Append daemon stderr to `path` instead of discarding it.
    pub fn stderr(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr = Some(path.into());
        self
    }

    pub fn pidfile(&self) -> &Path {
        &self.pidfile
    }

    /// Forks twice and returns in both the invoking process and the daemon.
    ///
    /// The working directory and log files are checked and opened before the
    /// first fork. The invoking process returns `Outcome::Parent` only once
    /// the daemon has written its pidfile. Any failure in between comes back
    /// as [`DaemonError::NotReady`]. Relative paths are resolved against the
    /// directory `start` is called from.
    ///
    /// Must be called while the process is single-threaded.
    pub fn start(&self) -> Result<Outcome, DaemonError> {
        let pidfile = absolute(&self.pidfile)?;
        ensure_not_running(&pidfile)?;

        let working_dir = absolute(&self.working_dir)?;
        if !working_dir.is_dir() {
            return Err(DaemonError::NotADirectory { path: working_dir });
        }
        let stdio = Stdio {
            stdin: open_dev_null(false)?,
            stdout: open_log(self.stdout.as_deref())?,
            stderr: open_log(self.stderr.as_deref())?,
        };

        let (ready_rx, ready_tx) = pipe().map_err(DaemonError::syscall("pipe"))?;

        // SAFETY: callers guarantee no other threads are running.
        match unsafe { fork() }.map_err(DaemonError::syscall("fork"))? {
            ForkResult::Parent { child } => {
                drop(ready_tx);
                await_ready(child, File::from(ready_rx))?;
                info!(pidfile = %pidfile.display(), "daemon launched");
                return Ok(Outcome::Parent);
            }
            ForkResult::Child => {}
        }

        drop(ready_rx);
        let mut ready = File::from(ready_tx);
        match self.detach(&working_dir, &stdio, &pidfile) {
            Ok(pid) => {
                ready
                    .write_all(READY)
                    .map_err(DaemonError::io(&pidfile))?;
                debug!(pid, "daemon detached");
                Ok(Outcome::Daemon)
            }
            Err(err) => {
                // the invoking process reports the failure
                let _ = ready.write_all(err.to_string().as_bytes());
                Err(err)
            }
        }
    }

    /// Runs in the first child. Returns the daemon's pid in the grandchild.
    fn detach(
        &self,
        working_dir: &Path,
        stdio: &Stdio,
        pidfile: &Path,
    ) -> Result<i32, DaemonError> {
        setsid().map_err(DaemonError::syscall("setsid"))?;

        // SAFETY: the intermediate child is single-threaded, as its parent was.
        match unsafe { fork() }.map_err(DaemonError::syscall("fork"))? {
            ForkResult::Parent { .. } => {
                // SAFETY: _exit skips atexit handlers and buffered stdio shared with the parent.
                unsafe { libc::_exit(0) }
            }
            ForkResult::Child => {}
        }

        chdir(working_dir).map_err(DaemonError::syscall("chdir"))?;
        umask(Mode::from_bits_truncate(self.umask as libc::mode_t));

        redirect(libc::STDIN_FILENO, &stdio.stdin)?;
        redirect(libc::STDOUT_FILENO, &stdio.stdout)?;
        redirect(libc::STDERR_FILENO, &stdio.stderr)?;

        let pid = getpid().as_raw();
        write_pidfile(pidfile, pid)?;
        Ok(pid)
    }
}

/// Descriptors the daemon's standard streams are pointed at.
struct Stdio {
    stdin: File,
    stdout: File,
    stderr: File,
}

/// Reaps the intermediate child and waits for the daemon's readiness report.
fn await_ready(child: Pid, mut ready: File) -> Result<(), DaemonError> {
    let status = waitpid(child, None).map_err(DaemonError::syscall("waitpid"))?;

    // EOF once both children have closed their ends
    let mut report = Vec::new();
    ready
        .read_to_end(&mut report)
        .map_err(|e| DaemonError::NotReady {
            reason: format!("reading readiness pipe: {e}"),
        })?;

    match (status, report.as_slice()) {
        (WaitStatus::Exited(_, 0), READY) => Ok(()),
        (status, []) => Err(DaemonError::NotReady {
            reason: format!("daemon exited before writing its pidfile ({status:?})"),
        }),
        (_, reason) => Err(DaemonError::NotReady {
            reason: String::from_utf8_lossy(reason).into_owned(),
        }),
    }
}

/// Sends SIGTERM to the process in `pidfile` and waits up to `timeout` for it
/// to exit, then removes the pidfile.
pub fn stop(pidfile: &Path, timeout: Duration) -> Result<StopOutcome, DaemonError> {
    let Some(pid) = read_pidfile(pidfile)? else {
        return Ok(StopOutcome::NotRunning);
    };

    if !is_running(pid) {
        remove_pidfile(pidfile)?;
        return Ok(StopOutcome::NotRunning);
    }

    info!(pid, "stopping daemon");
    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(DaemonError::syscall("kill"))?;

    let deadline = Instant::now() + timeout;
    while is_running(pid) {
        if Instant::now() >= deadline {
            return Err(DaemonError::StopTimeout { pid });
        }
        thread::sleep(STOP_POLL);
    }

    remove_pidfile(pidfile)?;
    Ok(StopOutcome::Stopped { pid })
}

fn absolute(path: &Path) -> Result<PathBuf, DaemonError> {
    std::path::absolute(path).map_err(DaemonError::io(path))
}

fn open_dev_null(write: bool) -> Result<File, DaemonError> {
    OpenOptions::new()
        .read(!write)
        .write(write)
        .open(DEV_NULL)
        .map_err(DaemonError::io(DEV_NULL))
}

fn open_log(path: Option<&Path>) -> Result<File, DaemonError> {
    match path {
        Some(path) => open_append(&absolute(path)?),
        None => open_dev_null(true),
    }
}

fn open_append(path: &Path) -> Result<File, DaemonError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(DaemonError::io(path))
}

fn redirect(target: libc::c_int, file: &File) -> Result<(), DaemonError> {
    // SAFETY: both descriptors are valid for the duration of the call.
    if unsafe { libc::dup2(file.as_raw_fd(), target) } == -1 {
        return Err(DaemonError::syscall("dup2")(Errno::last()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_builder_defaults() {
        let daemon = Daemon::new("run/d.pid");
        assert_eq!(daemon.pidfile(), Path::new("run/d.pid"));
        assert_eq!(daemon.working_dir, PathBuf::from("/"));
        assert_eq!(daemon.umask, 0);
        assert!(daemon.stdout.is_none());

        let daemon = daemon.working_dir("/tmp").umask(0o022).stderr("err.log");
        assert_eq!(daemon.working_dir, PathBuf::from("/tmp"));
        assert_eq!(daemon.umask, 0o022);
        assert_eq!(daemon.stderr, Some(PathBuf::from("err.log")));
    }

    #[test]
    fn test_start_refuses_live_pidfile() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("d.pid");
        write_pidfile(&pidfile, std::process::id() as i32).unwrap();

        let err = Daemon::new(&pidfile).start().unwrap_err();
        assert_eq!(err.reason_code(), "already_running");
    }

    #[test]
    fn test_start_checks_working_dir_before_forking() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("d.pid");

        let err = Daemon::new(&pidfile)
            .working_dir(dir.path().join("missing"))
            .start()
            .unwrap_err();
        assert_eq!(err.reason_code(), "not_a_directory");
        assert!(!pidfile.exists());
    }

    #[test]
    fn test_start_opens_log_before_forking() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("d.pid");

        let err = Daemon::new(&pidfile)
            .working_dir(dir.path())
            .stdout(dir.path().join("no/such/dir/out.log"))
            .start()
            .unwrap_err();
        assert_eq!(err.reason_code(), "io_error");
        assert!(!pidfile.exists());
    }

    #[test]
    fn test_stop_without_pidfile() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = stop(&dir.path().join("d.pid"), Duration::from_secs(1)).unwrap();
        assert_eq!(outcome, StopOutcome::NotRunning);
    }

    #[test]
    fn test_stop_terminates_process() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("d.pid");

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;
        write_pidfile(&pidfile, pid).unwrap();
        // reap on exit, otherwise the zombie still answers signal 0
        let reaper = thread::spawn(move || child.wait());

        let outcome = stop(&pidfile, Duration::from_secs(10)).unwrap();
        assert_eq!(outcome, StopOutcome::Stopped { pid });
        assert!(!pidfile.exists());
        assert!(!reaper.join().unwrap().unwrap().success());
    }
}
