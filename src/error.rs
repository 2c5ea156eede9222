use thiserror::Error;

/// Fatal input-shape errors: these abort a run before any output is written.
#[derive(Debug, Error)]
pub enum ArchiverError {
    #[error("source workbook is missing sheet `{0}`")]
    MissingSheet(String),
    #[error("sheet `{sheet}` is missing required column `{column}`")]
    MissingColumn { sheet: String, column: String },
    #[error("source filename `{0}` does not match the source_<locale> pattern")]
    SourceNamePattern(String),
    #[error("no bestseller prefix configured for locale `{0}`")]
    UnknownLocale(String),
}

/// Codes attached to per-record skips. These never abort the batch; they are
/// summarized in the command report and emitted as ARCHIVER_WARN lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    BadTagDate,
    MissingKey,
    MissingHandle,
    KeylessRow,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadTagDate => "BAD_TAG_DATE",
            Self::MissingKey => "MISSING_KEY",
            Self::MissingHandle => "MISSING_HANDLE",
            Self::KeylessRow => "KEYLESS_ROW",
        }
    }
}
