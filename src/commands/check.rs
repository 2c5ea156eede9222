use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

use crate::commands::CommandReport;
use crate::commands::run::{discover_sources, locale_from_source};
use crate::engine::grouping::GroupingTable;
use crate::engine::record::{COL_ID, COL_TAGS, REQUIRED_COLUMNS, SHEET_PRODUCTS};
use crate::engine::tags::tokenize;
use crate::engine::workbook::{Workbook, cell_text};

include!(concat!(env!("OUT_DIR"), "/archiver_env_allowlist.rs"));

const ENV_PREFIXES: &[&str] = &["ARCHIVER_", "PIM_"];

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub sources: Vec<PathBuf>,
    pub dir: PathBuf,
}

fn check_one(source: &Path) -> Result<CommandReport> {
    let mut report = CommandReport::new("check");

    let locale = match locale_from_source(source) {
        Ok(locale) => locale,
        Err(err) => {
            report.issue(format!("{}: {err}", source.display()));
            return Ok(report);
        }
    };

    let workbook = match Workbook::load(source) {
        Ok(workbook) => workbook,
        Err(err) => {
            report.issue(format!("{}: {err:#}", source.display()));
            return Ok(report);
        }
    };

    let missing = match workbook.missing_columns(SHEET_PRODUCTS, REQUIRED_COLUMNS) {
        Ok(missing) => missing,
        Err(err) => {
            report.issue(format!("{}: {err}", source.display()));
            return Ok(report);
        }
    };
    for column in &missing {
        report.issue(format!(
            "locale={locale} sheet={SHEET_PRODUCTS} missing required column `{column}`"
        ));
    }

    let collections = source
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("collections_{locale}.json"));
    match GroupingTable::load(&collections) {
        Ok(table) => {
            if table.is_empty() {
                report.detail(format!("locale={locale} grouping table is empty"));
            } else {
                report.detail(format!("locale={locale} grouping_entries={}", table.len()));
            }
        }
        Err(err) => report.issue(format!("locale={locale} {err:#}")),
    }

    let sheet = workbook.sheet(SHEET_PRODUCTS)?;
    let mut bad_tag_dates = 0usize;
    for row in sheet {
        if let Err(err) = tokenize(&cell_text(row, COL_TAGS)) {
            bad_tag_dates += 1;
            report.issue(format!(
                "locale={locale} record {}: {err}",
                cell_text(row, COL_ID)
            ));
        }
    }

    report.detail(format!(
        "locale={locale} rows={} missing_columns={} bad_tag_dates={bad_tag_dates}",
        sheet.len(),
        missing.len(),
    ));
    Ok(report)
}

/// Catch the classic deployment mistake of a typo'd override that silently
/// falls back to a default. The allowlist is generated at build time from
/// the keys the source actually reads.
fn check_env_keys(report: &mut CommandReport) {
    for (key, _) in env::vars() {
        if !ENV_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
            continue;
        }
        if !GENERATED_ARCHIVER_ENV_ALLOWLIST.contains(&key.as_str()) {
            report.issue(format!("unknown environment variable `{key}`"));
        }
    }
}

/// Pre-flight a drop of export files without writing anything: workbook
/// shape, grouping tables, tag corruption, environment typos.
pub fn run(opts: &CheckOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("check");

    let sources = discover_sources(&opts.sources, &opts.dir)?;
    report.detail(format!("sources={}", sources.len()));
    for source in &sources {
        report.merge(check_one(source)?);
    }

    check_env_keys(&mut report);
    Ok(report)
}
