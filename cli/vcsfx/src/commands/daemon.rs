//! Daemon commands.

use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{error, info};
use vcsfx_daemon::{remove_pidfile, stop, Daemon, Outcome, StopOutcome};

use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Daemon commands.
#[derive(Debug, Args)]
pub struct DaemonCommand {
    #[command(subcommand)]
    command: DaemonSubcommand,
}

#[derive(Debug, Subcommand)]
enum DaemonSubcommand {
    /// Detach and exec a command, recording its pid.
    Start(StartArgs),

    /// Stop the daemon named by a pidfile.
    Stop(StopArgs),
}

#[derive(Debug, Args)]
struct StartArgs {
    /// Pidfile to write. Start is refused if it names a live process.
    #[arg(long, value_name = "PATH")]
    pidfile: PathBuf,

    /// Working directory of the daemon.
    #[arg(long, value_name = "DIR", default_value = "/")]
    workdir: PathBuf,

    /// Append daemon stdout and stderr to this file.
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// File mode creation mask, in octal.
    #[arg(long, default_value = "022", value_parser = parse_octal)]
    umask: u32,

    /// Command to run, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[derive(Debug, Args)]
struct StopArgs {
    #[arg(long, value_name = "PATH")]
    pidfile: PathBuf,

    /// Seconds to wait for the process to exit.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn parse_octal(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s, 8)
        .ok()
        .filter(|mask| *mask <= 0o777)
        .ok_or_else(|| format!("'{s}' is not an octal mode mask"))
}

impl DaemonCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            DaemonSubcommand::Start(args) => start(args),
            DaemonSubcommand::Stop(args) => stop_daemon(ctx, args),
        }
    }
}

fn start(args: StartArgs) -> Result<()> {
    let pidfile = std::path::absolute(&args.pidfile)
        .with_context(|| format!("invalid pidfile path {}", args.pidfile.display()))?;

    let mut daemon = Daemon::new(&pidfile)
        .working_dir(&args.workdir)
        .umask(args.umask);
    if let Some(log) = &args.log {
        daemon = daemon.stdout(log).stderr(log);
    }

    match daemon.start()? {
        Outcome::Parent => {
            print_success(&format!("Daemon started, pidfile {}", pidfile.display()));
            Ok(())
        }
        Outcome::Daemon => {
            let (program, rest) = args
                .command
                .split_first()
                .context("no command given")?;
            info!(program = %program, args = ?rest, "exec daemon command");

            // exec only returns on failure
            let err = Command::new(program).args(rest).exec();
            error!(program = %program, error = %err, "exec failed");
            remove_pidfile(&pidfile)?;
            Err(err).with_context(|| format!("failed to exec {program}"))
        }
    }
}

fn stop_daemon(ctx: CommandContext, args: StopArgs) -> Result<()> {
    let outcome = stop(&args.pidfile, Duration::from_secs(args.timeout))?;

    match (ctx.format, outcome) {
        (OutputFormat::Json, StopOutcome::Stopped { pid }) => {
            print_single(&serde_json::json!({ "stopped": true, "pid": pid }))
        }
        (OutputFormat::Json, StopOutcome::NotRunning) => {
            print_single(&serde_json::json!({ "stopped": false }))
        }
        (OutputFormat::Table, StopOutcome::Stopped { pid }) => {
            print_success(&format!("Stopped daemon with pid {pid}"))
        }
        (OutputFormat::Table, StopOutcome::NotRunning) => print_info(&format!(
            "No daemon running for {}",
            args.pidfile.display()
        )),
    }

    Ok(())
}
