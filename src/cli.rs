use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::commands::check::{self, CheckOptions};
use crate::commands::run::{self, ImageMode, RunOptions};
use crate::commands::CommandReport;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_STAMP"));

#[derive(Debug, Parser)]
#[command(
    name = "catalog-archiver",
    version = VERSION,
    about = "Archives stale hidden catalog products into deletion, page, and redirect import sheets."
)]
struct Cli {
    /// Print the command report as JSON instead of plain lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImageModeArg {
    /// Image cells live on the export rows themselves.
    Rows,
    /// Image metadata comes from the PIM gallery table.
    Gallery,
}

impl From<ImageModeArg> for ImageMode {
    fn from(arg: ImageModeArg) -> Self {
        match arg {
            ImageModeArg::Rows => ImageMode::Rows,
            ImageModeArg::Gallery => ImageMode::Gallery,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transform source workbooks into output workbooks.
    Run {
        /// Explicit source workbook(s); skips directory discovery.
        #[arg(long)]
        source: Vec<PathBuf>,
        /// Directory scanned for source_<locale>.json files.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Where output workbooks land; defaults beside each source.
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Override the configured retention window.
        #[arg(long)]
        retention_days: Option<u32>,
        /// Pin the reference date for a reproducible run.
        #[arg(long, value_name = "YYYY-MM-DD")]
        reference_date: Option<String>,
        /// Where image attachments come from.
        #[arg(long, value_enum, default_value_t = ImageModeArg::Rows)]
        images: ImageModeArg,
        /// Run the full transform but write nothing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Pre-flight validation of source workbooks and environment.
    Check {
        /// Explicit source workbook(s); skips directory discovery.
        #[arg(long)]
        source: Vec<PathBuf>,
        /// Directory scanned for source_<locale>.json files.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

fn parse_reference_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.map(|value| {
        NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .with_context(|| format!("invalid --reference-date `{value}`: expected YYYY-MM-DD"))
    })
    .transpose()
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        eprintln!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Run {
            source,
            dir,
            out_dir,
            retention_days,
            reference_date,
            images,
            dry_run,
        } => run::run(&RunOptions {
            sources: source,
            dir,
            out_dir,
            retention_days,
            reference_date: parse_reference_date(reference_date)?,
            images: images.into(),
            dry_run,
        })?,
        Command::Check { source, dir } => check::run(&CheckOptions {
            sources: source,
            dir,
        })?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!(
            "{} finished with {} issue(s)",
            report.command,
            report.issues.len()
        );
    }
    Ok(())
}
