//! Fixture commands.
//!
//! These commands operate purely on local files.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use vcsfx_fixture::{validate_fixture_str, FixtureBuilder, FixtureValidator};
use vcsfx_pkggen::{PackageKind, StoryId};

use crate::error::CliError;
use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Fixture commands.
#[derive(Debug, Args)]
pub struct FixtureCommand {
    #[command(subcommand)]
    command: FixtureSubcommand,
}

#[derive(Debug, Subcommand)]
enum FixtureSubcommand {
    /// Build a fixture document for a story.
    Generate(GenerateArgs),

    /// Validate a fixture file against the schema.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Story the fixture belongs to.
    #[arg(long)]
    story: StoryId,

    /// Number of clustered services.
    #[arg(long, default_value_t = 1)]
    cs: u32,

    /// Applications per clustered service.
    #[arg(long, default_value_t = 1)]
    apps: u32,

    /// Virtual IPs per application.
    #[arg(long, default_value_t = 0)]
    vips: u32,

    /// Package kind the applications install (standard, ping, fail, ...).
    #[arg(long, default_value = "standard")]
    package_kind: PackageKind,

    /// Write the document here instead of stdout.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Fixture file (JSON).
    file: PathBuf,
}

impl FixtureCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            FixtureSubcommand::Generate(args) => generate(args),
            FixtureSubcommand::Validate(args) => validate(ctx, args),
        }
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let doc = FixtureBuilder::new(args.story)
        .clustered_services(args.cs)
        .apps_per_service(args.apps)
        .vips_per_app(args.vips)
        .package_kind(args.package_kind)
        .build();

    FixtureValidator::new()?.ensure_valid(&serde_json::to_value(&doc)?)?;
    let json = doc.to_json_pretty()?;

    match args.out {
        Some(path) => {
            fs::write(&path, format!("{json}\n"))
                .with_context(|| format!("failed to write fixture {}", path.display()))?;
            print_success(&format!(
                "Wrote {} with {} entities",
                path.display(),
                doc.entities().count()
            ));
        }
        None => println!("{json}"),
    }

    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct IssueRow {
    #[tabled(rename = "ISSUE")]
    message: String,
}

fn validate(ctx: CommandContext, args: ValidateArgs) -> Result<()> {
    let contents = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read fixture {}", args.file.display()))?;
    let issues = validate_fixture_str(&contents)?;

    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({
            "valid": issues.is_empty(),
            "issues": issues,
        })),
        OutputFormat::Table if issues.is_empty() => {
            print_success(&format!("Fixture is valid: {}", args.file.display()));
        }
        OutputFormat::Table => {
            let rows: Vec<IssueRow> = issues
                .iter()
                .map(|issue| IssueRow {
                    message: issue.message.clone(),
                })
                .collect();
            print_output(&rows, OutputFormat::Table);
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(CliError::InvalidFixture {
            path: args.file.display().to_string(),
            issues: issues.len(),
        }
        .into())
    }
}
