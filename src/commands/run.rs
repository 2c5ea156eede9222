use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::CommandReport;
use crate::engine::config::{ArchiverConfig, load_config, pim_token};
use crate::engine::gallery::{GalleryImageSource, HttpTableFetch, SnapshotTableFetch, TableFetch};
use crate::engine::grouping::GroupingTable;
use crate::engine::images::{ImageSource, RowImageSource};
use crate::engine::project::{ProjectorContext, project, to_workbook};
use crate::engine::record::{REQUIRED_COLUMNS, SHEET_PRODUCTS, collapse_rows};
use crate::engine::warn;
use crate::engine::workbook::Workbook;
use crate::error::{ArchiverError, IssueCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    Rows,
    Gallery,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub sources: Vec<PathBuf>,
    pub dir: PathBuf,
    pub out_dir: Option<PathBuf>,
    pub retention_days: Option<u32>,
    pub reference_date: Option<NaiveDate>,
    pub images: ImageMode,
    pub dry_run: bool,
}

/// Explicit `--source` paths win; otherwise every `source_<locale>.json`
/// in the directory is processed. Zero sources is fatal, not a no-op: a
/// misnamed export should never look like a clean run.
pub fn discover_sources(explicit: &[PathBuf], dir: &Path) -> Result<Vec<PathBuf>> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }

    let mut found = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("source_") && name.ends_with(".json") {
            found.push(path);
        }
    }
    found.sort();

    if found.is_empty() {
        return Err(anyhow!(
            "no source files matching source_<locale>.json found in {}",
            dir.display()
        ));
    }
    Ok(found)
}

pub fn locale_from_source(source: &Path) -> Result<String, ArchiverError> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let locale = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("source_"))
        .map(str::to_lowercase)
        .unwrap_or_default();
    if locale.is_empty() {
        return Err(ArchiverError::SourceNamePattern(name));
    }
    Ok(locale)
}

fn image_source(cfg: &ArchiverConfig, mode: ImageMode) -> Result<Box<dyn ImageSource>> {
    match mode {
        ImageMode::Rows => Ok(Box::new(RowImageSource)),
        ImageMode::Gallery => {
            let fetch: Box<dyn TableFetch> = match &cfg.pim.snapshot_dir {
                Some(dir) => Box::new(SnapshotTableFetch::new(dir)),
                None => {
                    if cfg.pim.base_url.trim().is_empty() {
                        return Err(anyhow!(
                            "gallery image mode needs pim.base_url (or PIM_SNAPSHOT_DIR)"
                        ));
                    }
                    Box::new(HttpTableFetch::new(
                        cfg.pim.base_url.clone(),
                        pim_token(),
                        cfg.pim.timeout_secs,
                    ))
                }
            };
            Ok(Box::new(GalleryImageSource::new(
                fetch,
                cfg.pim.table.clone(),
                cfg.pim.image_base_url.clone(),
            )))
        }
    }
}

fn run_one(
    report: &mut CommandReport,
    cfg: &ArchiverConfig,
    opts: &RunOptions,
    source: &Path,
    reference_date: NaiveDate,
    retention_days: u32,
) -> Result<()> {
    let locale = locale_from_source(source)?;
    let prefix = cfg.prefix_for_locale(&locale)?;
    let parent = source.parent().unwrap_or(Path::new("."));

    let grouping = GroupingTable::load(&parent.join(format!("collections_{locale}.json")))?;
    let workbook = Workbook::load(source)?;
    workbook.require_columns(SHEET_PRODUCTS, REQUIRED_COLUMNS)?;

    let collapse = collapse_rows(workbook.sheet(SHEET_PRODUCTS)?);
    for row_index in &collapse.keyless_rows {
        warn::emit(
            IssueCode::KeylessRow,
            SHEET_PRODUCTS,
            "na",
            "na",
            &format!("row {row_index} has an empty ID"),
        );
    }

    let source_impl = image_source(cfg, opts.images)?;
    let images = source_impl.images_by_key(&collapse.records)?;
    let ctx = ProjectorContext {
        grouping: &grouping,
        images: &images,
        reference_date,
        retention_days,
        bestseller_prefix: prefix,
    };
    let outcome = project(&collapse.records, &ctx);

    for issue in &outcome.skipped {
        warn::emit(
            issue.code,
            SHEET_PRODUCTS,
            &issue.key,
            &issue.handle,
            &issue.reason,
        );
    }

    report.detail(format!(
        "locale={locale} source={} images={}",
        source.display(),
        source_impl.name()
    ));
    report.detail(format!(
        "locale={locale} scanned={} hidden={} eligible={} skipped={} keyless_rows={}",
        outcome.counts.scanned,
        outcome.counts.hidden,
        outcome.counts.eligible,
        outcome.counts.skipped,
        collapse.keyless_rows.len(),
    ));
    if !outcome.skipped.is_empty() {
        let keys: Vec<&str> = outcome
            .skipped
            .iter()
            .map(|issue| issue.key.as_str())
            .collect();
        report.detail(format!("locale={locale} skipped_keys={}", keys.join(",")));
    }

    if opts.dry_run {
        report.detail(format!("locale={locale} dry-run: output not written"));
        return Ok(());
    }

    let out_dir = opts
        .out_dir
        .clone()
        .unwrap_or_else(|| parent.to_path_buf());
    let out_path = out_dir.join(format!("output_{locale}.json"));
    to_workbook(&outcome.cases)?.save(&out_path)?;
    report.detail(format!("locale={locale} output={}", out_path.display()));
    Ok(())
}

pub fn run(opts: &RunOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let retention_days = opts.retention_days.unwrap_or(cfg.rules.retention_days);
    if retention_days == 0 {
        return Err(anyhow!("invalid retention days: must be >= 1"));
    }
    let reference_date = cfg.resolved_reference_date(opts.reference_date)?;

    let mut report = CommandReport::new("run");
    report.detail(format!("reference_date={reference_date}"));
    report.detail(format!("retention_days={retention_days}"));

    let sources = discover_sources(&opts.sources, &opts.dir)?;
    for source in &sources {
        run_one(&mut report, &cfg, opts, source, reference_date, retention_days)?;
    }

    Ok(report)
}
