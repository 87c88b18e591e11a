//! Classic double-fork Unix daemonizer.
//!
//! ```ignore
//! match Daemon::new("/var/run/svc.pid").stdout("/var/log/svc.log").start()? {
//!     Outcome::Parent => return Ok(()),
//!     Outcome::Daemon => serve(),
//! }
//! ```

mod daemon;
mod error;
mod pidfile;

pub use daemon::{stop, Daemon, Outcome, StopOutcome};
pub use error::DaemonError;
pub use pidfile::{
    ensure_not_running, is_running, read_pidfile, remove_pidfile, write_pidfile, PIDFILE_MODE,
};
