//! Error handling and display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use thiserror::Error;
use vcsfx_daemon::DaemonError;
use vcsfx_pkggen::ConfigError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{failed} of {attempted} package build(s) failed")]
    BuildsFailed {
        failed: usize,
        attempted: usize,
        output_dir: PathBuf,
    },

    #[error("{path} failed validation ({issues} issue(s))")]
    InvalidFixture { path: String, issues: usize },
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::BuildsFailed { output_dir, .. } => {
                eprintln!(
                    "\n{}",
                    format!(
                        "Hint: sources of failed builds are kept in {} for diagnosis. \
                         Rerun the same command to retry them.",
                        output_dir.display()
                    )
                    .yellow()
                );
            }
            CliError::InvalidFixture { .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: `vcsfx fixture generate` produces documents that pass the schema."
                        .yellow()
                );
            }
        }
        return;
    }

    if let Some(DaemonError::AlreadyRunning { pidfile, .. }) = err.downcast_ref::<DaemonError>() {
        eprintln!(
            "\n{}",
            format!(
                "Hint: stop it with `vcsfx daemon stop --pidfile {}`.",
                pidfile.display()
            )
            .yellow()
        );
        return;
    }

    if err.downcast_ref::<ConfigError>().is_some() {
        eprintln!(
            "\n{}",
            "Hint: check the config file and VCSFX_* environment variables.".yellow()
        );
    }
}
