//! CLI commands.

mod daemon;
mod fixture;
mod rpm;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::logging::{LogFormat, DEFAULT_LOG_LEVEL};
use crate::output::OutputFormat;

/// vcsfx - package and fixture generation for cluster integration tests.
#[derive(Debug, Parser)]
#[command(name = "vcsfx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate LSB wrapper packages.
    Rpm(rpm::RpmCommand),

    /// Generate and validate fixture documents.
    Fixture(fixture::FixtureCommand),

    /// Run a command as a detached daemon, or stop one.
    Daemon(daemon::DaemonCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub fn run(self) -> Result<()> {
        let ctx = CommandContext {
            format: self.format,
        };

        match self.command {
            Commands::Rpm(cmd) => cmd.run(ctx),
            Commands::Fixture(cmd) => cmd.run(ctx),
            Commands::Daemon(cmd) => cmd.run(ctx),
            Commands::Version => {
                println!("vcsfx {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub format: OutputFormat,
}
