//! Package generation commands.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;
use tracing::info;
use vcsfx_pkggen::{
    EmbeddedTemplates, GenerationReport, Generator, PackageKind, PackageRequest, PackageVersion,
    StoryId, SurplusPolicy,
};

use crate::error::CliError;
use crate::output::{print_info, print_output, print_single, print_warning, OutputFormat};

use super::CommandContext;

/// Package commands.
#[derive(Debug, Args)]
pub struct RpmCommand {
    #[command(subcommand)]
    command: RpmSubcommand,
}

#[derive(Debug, Subcommand)]
enum RpmSubcommand {
    /// Ensure a story has N packages of one kind in <output-dir>/dist.
    Generate(GenerateArgs),
}

/// Kinds that install and run cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ValidKind {
    Standard,
    Ping,
    Http,
    Delay,
}

/// Kinds that exercise fault handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InvalidKind {
    /// Fails every other start.
    Fail,
    /// Fixed upgrade of `fail`.
    FailFixed,
}

impl From<ValidKind> for PackageKind {
    fn from(kind: ValidKind) -> Self {
        match kind {
            ValidKind::Standard => PackageKind::Standard,
            ValidKind::Ping => PackageKind::Ping,
            ValidKind::Http => PackageKind::Http,
            ValidKind::Delay => PackageKind::DelayedOffline,
        }
    }
}

impl From<InvalidKind> for PackageKind {
    fn from(kind: InvalidKind) -> Self {
        match kind {
            InvalidKind::Fail => PackageKind::FailingFlaky,
            InvalidKind::FailFixed => PackageKind::FailingStable,
        }
    }
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("kind").required(true).args(["valid", "invalid"])))]
struct GenerateArgs {
    /// Story the packages belong to.
    #[arg(long)]
    story: u32,

    /// Number of packages the story should end up with.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,

    /// Generate a healthy package kind.
    #[arg(long, value_enum)]
    valid: Option<ValidKind>,

    /// Generate a failing package kind.
    #[arg(long, value_enum)]
    invalid: Option<InvalidKind>,

    /// Package version, X.Y or X.Y.Z.
    #[arg(long, value_name = "VERSION")]
    rpm_version: Option<PackageVersion>,

    /// Output root; packages land in <DIR>/dist.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Generator config file (TOML).
    #[arg(long, value_name = "PATH", env = "VCSFX_CONFIG")]
    config: Option<PathBuf>,

    /// Build COUNT more packages even when the story already has enough.
    #[arg(long)]
    legacy_surplus: bool,

    /// Rebuild the story's existing packages at --rpm-version instead of
    /// adding new ones. COUNT is ignored.
    #[arg(long, conflicts_with = "legacy_surplus")]
    upgrade: bool,
}

impl GenerateArgs {
    fn kind(&self) -> Result<PackageKind> {
        self.valid
            .map(PackageKind::from)
            .or(self.invalid.map(PackageKind::from))
            .ok_or_else(|| anyhow!("one of --valid or --invalid is required"))
    }
}

impl RpmCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            RpmSubcommand::Generate(args) => generate(ctx, args),
        }
    }
}

/// One row of the generation summary.
#[derive(Debug, Serialize, Tabled)]
struct PackageRow {
    #[tabled(rename = "SEQ")]
    sequence: u32,
    #[tabled(rename = "STATUS")]
    status: &'static str,
    #[tabled(rename = "DETAIL")]
    detail: String,
}

fn rows(report: &GenerationReport) -> Vec<PackageRow> {
    let existing = report.existing.iter().map(|&sequence| PackageRow {
        sequence,
        status: "existing",
        detail: String::new(),
    });
    let built = report.built.iter().map(|package| PackageRow {
        sequence: package.sequence,
        status: "built",
        detail: package
            .files
            .iter()
            .filter_map(|file| file.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(", "),
    });
    let failed = report.failed.iter().map(|failure| PackageRow {
        sequence: failure.sequence,
        status: "failed",
        detail: match failure.exit_code {
            Some(code) => format!("exit {code}"),
            None => "killed by signal".to_string(),
        },
    });

    let mut rows: Vec<_> = existing.chain(built).chain(failed).collect();
    rows.sort_by_key(|row| row.sequence);
    rows
}

fn generate(ctx: CommandContext, args: GenerateArgs) -> Result<()> {
    let kind = args.kind()?;
    let mut config = crate::config::load(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if args.legacy_surplus {
        config.surplus = SurplusPolicy::LegacyAdditive;
    }

    let version = args
        .rpm_version
        .unwrap_or_else(|| config.default_version.clone());
    let request = PackageRequest::new(StoryId::from(args.story), args.count, Some(version), kind)?;

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    info!(
        story = %request.story,
        kind = %kind,
        count = request.count,
        output_dir = %config.output_dir.display(),
        "generating packages"
    );

    let generator = Generator::new(
        EmbeddedTemplates::new()?,
        config.build_tool(),
        &config.output_dir,
    )
    .with_surplus_policy(config.surplus);

    let report = if args.upgrade {
        generator.upgrade_rpms(kind, &request.story, &request.version)
    } else {
        generator.generate_rpms(&request)
    }
    .with_context(|| format!("failed to generate packages for story {}", request.story))?;

    match ctx.format {
        OutputFormat::Json => print_single(&report),
        OutputFormat::Table => {
            print_output(&rows(&report), OutputFormat::Table);
            print_info(&format!(
                "{} {} package(s) for story {} at version {}: {} existing, {} built",
                report.total(),
                report.kind,
                report.story,
                report.version,
                report.existing.len(),
                report.built.len()
            ));
            for failure in &report.failed {
                print_warning(&format!(
                    "{} failed: {}",
                    failure.package_name,
                    failure.stderr.lines().last().unwrap_or("no output")
                ));
            }
        }
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::BuildsFailed {
            failed: report.failed.len(),
            attempted: report.built.len() + report.failed.len(),
            output_dir: config.output_dir,
        }
        .into())
    }
}
