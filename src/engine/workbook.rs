use crate::error::ArchiverError;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub type Row = Map<String, Value>;
pub type Sheet = Vec<Row>;

/// A multi-sheet snapshot: one top-level JSON object keyed by sheet name,
/// each sheet an array of row objects. Spreadsheet conversion happens
/// outside this tool; the engine only ever sees this document.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: BTreeMap<String, Sheet>,
}

impl Workbook {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let sheets: BTreeMap<String, Sheet> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Self { sheets })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(&self.sheets)?;
        fs::write(path, format!("{data}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet, ArchiverError> {
        self.sheets
            .get(name)
            .ok_or_else(|| ArchiverError::MissingSheet(name.to_string()))
    }

    pub fn insert_sheet(&mut self, name: impl Into<String>, sheet: Sheet) {
        self.sheets.insert(name.into(), sheet);
    }

    /// Columns absent from every row of a non-empty sheet. Sparse rows are
    /// normal in an export (continuation rows carry only image cells), so a
    /// column counts as present if any row has it.
    pub fn missing_columns<'a>(
        &self,
        sheet_name: &str,
        columns: &[&'a str],
    ) -> Result<Vec<&'a str>, ArchiverError> {
        let sheet = self.sheet(sheet_name)?;
        if sheet.is_empty() {
            return Ok(Vec::new());
        }
        Ok(columns
            .iter()
            .filter(|column| !sheet.iter().any(|row| row.contains_key(**column)))
            .copied()
            .collect())
    }

    /// Batch-fatal shape check: every required column must appear somewhere
    /// in the sheet before any record is processed.
    pub fn require_columns(&self, sheet_name: &str, columns: &[&str]) -> Result<(), ArchiverError> {
        let missing = self.missing_columns(sheet_name, columns)?;
        match missing.first() {
            Some(column) => Err(ArchiverError::MissingColumn {
                sheet: sheet_name.to_string(),
                column: (*column).to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Read one cell as text. Absent and null cells read as empty strings, the
/// same view a `fillna('')` pass would give the original export.
pub fn cell_text(row: &Row, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}
