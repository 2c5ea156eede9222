use crate::engine::workbook::{Row, cell_text};

pub const SHEET_PRODUCTS: &str = "Products";

pub const COL_ID: &str = "ID";
pub const COL_HANDLE: &str = "Handle";
pub const COL_COMMAND: &str = "Command";
pub const COL_TITLE: &str = "Title";
pub const COL_BODY_HTML: &str = "Body HTML";
pub const COL_TAGS: &str = "Tags";
pub const COL_VARIANT_SKU: &str = "Variant SKU";
pub const COL_EXTERNAL_KEY: &str =
    "Variant Metafield: mf_pvp.MKT_ID_SHOPSYS [number_integer]";
pub const COL_BENEFITS: &str =
    "Variant Metafield: mf_pvp.SHPF_BENEFITS [multi_line_text_field]";
pub const COL_SHORT_DESCRIPTION: &str =
    "Variant Metafield: mf_pvp.SHPF_SHORT_DESCRIPTION [multi_line_text_field]";
pub const COL_IMAGE_SRC: &str = "Image Src";
pub const COL_IMAGE_POSITION: &str = "Image Position";

/// Columns that must exist somewhere in the Products sheet before a run
/// touches any record. The image columns are optional (gallery mode sources
/// images elsewhere).
pub const REQUIRED_COLUMNS: &[&str] = &[
    COL_ID,
    COL_HANDLE,
    COL_COMMAND,
    COL_TITLE,
    COL_BODY_HTML,
    COL_TAGS,
    COL_VARIANT_SKU,
    COL_EXTERNAL_KEY,
];

/// Raw image cells carried by an export row, kept untyped until the image
/// source parses positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCell {
    pub src: String,
    pub position: String,
}

/// One logical product. The export writes one row per image, so a record
/// may span several rows sharing an `ID`; the first row supplies the
/// product fields and every row may contribute an image cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub key: String,
    pub handle: String,
    pub title: String,
    pub body_html: String,
    pub tags: String,
    pub variant_sku: String,
    pub external_key: String,
    pub benefits: String,
    pub short_description: String,
    pub image_cells: Vec<ImageCell>,
}

#[derive(Debug, Clone, Default)]
pub struct CollapseOutcome {
    pub records: Vec<SourceRecord>,
    /// Zero-based sheet row indexes with an empty `ID`; skipped, not fatal.
    pub keyless_rows: Vec<usize>,
}

fn record_from_row(key: String, row: &Row) -> SourceRecord {
    SourceRecord {
        key,
        handle: cell_text(row, COL_HANDLE),
        title: cell_text(row, COL_TITLE),
        body_html: cell_text(row, COL_BODY_HTML),
        tags: cell_text(row, COL_TAGS),
        variant_sku: cell_text(row, COL_VARIANT_SKU),
        external_key: cell_text(row, COL_EXTERNAL_KEY),
        benefits: cell_text(row, COL_BENEFITS),
        short_description: cell_text(row, COL_SHORT_DESCRIPTION),
        image_cells: Vec::new(),
    }
}

/// Group export rows into logical records by `ID`, preserving first-seen
/// order. Continuation rows only contribute their image cells.
pub fn collapse_rows(sheet: &[Row]) -> CollapseOutcome {
    let mut outcome = CollapseOutcome::default();
    let mut index_by_key: std::collections::BTreeMap<String, usize> =
        std::collections::BTreeMap::new();

    for (row_index, row) in sheet.iter().enumerate() {
        let key = cell_text(row, COL_ID);
        if key.trim().is_empty() {
            outcome.keyless_rows.push(row_index);
            continue;
        }

        let record_index = *index_by_key.entry(key.clone()).or_insert_with(|| {
            outcome.records.push(record_from_row(key, row));
            outcome.records.len() - 1
        });

        let src = cell_text(row, COL_IMAGE_SRC);
        if !src.trim().is_empty() {
            outcome.records[record_index].image_cells.push(ImageCell {
                src,
                position: cell_text(row, COL_IMAGE_POSITION),
            });
        }
    }

    outcome
}
