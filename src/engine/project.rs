use crate::engine::grouping::{GroupingFields, GroupingTable, resolve};
use crate::engine::images::{ImageIndex, ImageSet, aggregate};
use crate::engine::record::{SHEET_PRODUCTS, SourceRecord};
use crate::engine::staleness::is_eligible_for_archive;
use crate::engine::tags::parse_tags;
use crate::engine::workbook::{Row, Workbook};
use crate::error::IssueCode;
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

pub const DELETE_COMMAND: &str = "DELETE";
pub const ARCHIVED_TEMPLATE_SUFFIX: &str = "archived-goods";
pub const ADDITIONAL_IMAGES_DELIMITER: &str = ";";

pub const SHEET_PAGES: &str = "Pages";
pub const SHEET_REDIRECTS: &str = "Redirects";

/// Everything the projector reads besides the records themselves. Built
/// once per source file; read-only during the transform.
pub struct ProjectorContext<'a> {
    pub grouping: &'a GroupingTable,
    pub images: &'a ImageIndex,
    pub reference_date: NaiveDate,
    pub retention_days: u32,
    pub bestseller_prefix: &'a str,
}

/// Field names follow the import tool's column headers exactly; the output
/// workbook is fed straight back into it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeletionInstruction {
    #[serde(rename = "ID")]
    pub key: String,
    #[serde(rename = "Command")]
    pub command: String,
    #[serde(rename = "Handle")]
    pub handle: String,
    #[serde(rename = "Title")]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplacementPage {
    #[serde(rename = "Handle")]
    pub handle: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Body HTML")]
    pub body_html: String,
    #[serde(rename = "Template Suffix")]
    pub template_suffix: String,
    #[serde(rename = "Metafield: mf_pg_ap.Image_Src [string]")]
    pub primary_image: String,
    #[serde(rename = "Metafield: mf_pg_ap.Addtl_Images [string]")]
    pub additional_images: String,
    #[serde(rename = "Metafield: mf_pg_ap.Shpsys_ID [integer]")]
    pub external_key: serde_json::Value,
    #[serde(rename = "Metafield: mf_pg_ap.Variant SKU [string]")]
    pub variant_sku: String,
    #[serde(rename = "Metafield: mf_pg_ap.main_category [string]")]
    pub group_name: String,
    #[serde(rename = "Metafield: mf_pg_ap.related_products_col [string]")]
    pub related_collection: String,
    #[serde(rename = "Metafield: mf_pg_ap.SHPF_BENEFITS [string]")]
    pub benefits: String,
    #[serde(rename = "Metafield: mf_pg_ap.SHPF_SHORT_DESCRIPTION [string]")]
    pub short_description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Redirect {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Target")]
    pub target: String,
}

/// The three linked shapes for one archived product. Constructed as one
/// aggregate so the shared handle and derived fields are computed once and
/// cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivalCase {
    pub deletion: DeletionInstruction,
    pub page: ReplacementPage,
    pub redirect: Redirect,
}

/// The export delivers the PIM key through a `[number_integer]` column; the
/// import tool's `[integer]` column wants it back as a number, so a numeric
/// value round-trips as one. Anything else passes through as text.
fn integer_or_text(raw: &str) -> serde_json::Value {
    match raw.trim().parse::<i64>() {
        Ok(number) => serde_json::Value::from(number),
        Err(_) => serde_json::Value::from(raw),
    }
}

impl ArchivalCase {
    fn new(record: &SourceRecord, images: ImageSet, grouping: GroupingFields) -> Self {
        let handle = record.handle.clone();
        Self {
            deletion: DeletionInstruction {
                key: record.key.clone(),
                command: DELETE_COMMAND.to_string(),
                handle: handle.clone(),
                title: record.title.clone(),
            },
            page: ReplacementPage {
                handle: handle.clone(),
                title: record.title.clone(),
                body_html: record.body_html.clone(),
                template_suffix: ARCHIVED_TEMPLATE_SUFFIX.to_string(),
                primary_image: images.primary,
                additional_images: images.additional.join(ADDITIONAL_IMAGES_DELIMITER),
                external_key: integer_or_text(&record.external_key),
                variant_sku: record.variant_sku.clone(),
                group_name: grouping.group_name,
                related_collection: grouping.related_collection,
                benefits: record.benefits.clone(),
                short_description: record.short_description.clone(),
            },
            redirect: Redirect {
                path: format!("/products/{handle}"),
                target: format!("/pages/{handle}"),
            },
        }
    }
}

/// One per-record skip; collected, never raised mid-batch.
#[derive(Debug, Clone)]
pub struct RecordIssue {
    pub code: IssueCode,
    pub key: String,
    pub handle: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionCounts {
    pub scanned: usize,
    pub hidden: usize,
    pub eligible: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct ProjectionOutcome {
    pub cases: Vec<ArchivalCase>,
    pub skipped: Vec<RecordIssue>,
    pub counts: ProjectionCounts,
}

fn skip(outcome: &mut ProjectionOutcome, code: IssueCode, record: &SourceRecord, reason: String) {
    outcome.counts.skipped += 1;
    outcome.skipped.push(RecordIssue {
        code,
        key: record.key.clone(),
        handle: record.handle.clone(),
        reason,
    });
}

/// The archival decision and field mapping for one snapshot. Pure: same
/// records, context and configuration always produce the same outcome, in
/// input order.
pub fn project(records: &[SourceRecord], ctx: &ProjectorContext) -> ProjectionOutcome {
    let mut outcome = ProjectionOutcome::default();

    for record in records {
        outcome.counts.scanned += 1;

        let facts = match parse_tags(&record.tags) {
            Ok(facts) => facts,
            Err(err) => {
                skip(&mut outcome, IssueCode::BadTagDate, record, err.to_string());
                continue;
            }
        };

        // Records without the hidden marker never reach the staleness check.
        if !facts.hidden {
            continue;
        }
        outcome.counts.hidden += 1;

        if !is_eligible_for_archive(facts.last_activity, ctx.reference_date, ctx.retention_days) {
            continue;
        }

        if record.key.trim().is_empty() {
            skip(
                &mut outcome,
                IssueCode::MissingKey,
                record,
                "eligible record has an empty ID".to_string(),
            );
            continue;
        }
        if record.handle.trim().is_empty() {
            skip(
                &mut outcome,
                IssueCode::MissingHandle,
                record,
                "eligible record has an empty Handle".to_string(),
            );
            continue;
        }

        outcome.counts.eligible += 1;
        let attachments = ctx
            .images
            .get(&record.key)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let images = aggregate(attachments);
        let grouping = resolve(facts.collection_id.as_deref(), ctx.grouping, ctx.bestseller_prefix);
        outcome.cases.push(ArchivalCase::new(record, images, grouping));
    }

    outcome
}

fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected an object row, got {other}"),
    }
}

/// Fan the cases out into the three aligned output sheets. Row `i` of every
/// sheet describes the same product.
pub fn to_workbook(cases: &[ArchivalCase]) -> Result<Workbook> {
    let mut products = Vec::with_capacity(cases.len());
    let mut pages = Vec::with_capacity(cases.len());
    let mut redirects = Vec::with_capacity(cases.len());

    for case in cases {
        products.push(to_row(&case.deletion)?);
        pages.push(to_row(&case.page)?);
        redirects.push(to_row(&case.redirect)?);
    }

    let mut workbook = Workbook::default();
    workbook.insert_sheet(SHEET_PRODUCTS, products);
    workbook.insert_sheet(SHEET_PAGES, pages);
    workbook.insert_sheet(SHEET_REDIRECTS, redirects);
    Ok(workbook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::images::{ImageSource, RowImageSource};
    use crate::engine::record::{ImageCell, SourceRecord};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    fn record(key: &str, handle: &str, tags: &str) -> SourceRecord {
        SourceRecord {
            key: key.to_string(),
            handle: handle.to_string(),
            title: format!("Product {key}"),
            body_html: "<p>desc</p>".to_string(),
            tags: tags.to_string(),
            variant_sku: format!("SKU-{key}"),
            external_key: format!("9{key}"),
            ..SourceRecord::default()
        }
    }

    fn context<'a>(
        grouping: &'a GroupingTable,
        images: &'a ImageIndex,
    ) -> ProjectorContext<'a> {
        ProjectorContext {
            grouping,
            images,
            reference_date: date("2024-04-01"),
            retention_days: 60,
            bestseller_prefix: "bestof",
        }
    }

    #[test]
    fn stale_hidden_record_produces_one_linked_case() {
        let grouping = GroupingTable::from_pairs([("77", "shoes")]);
        let images = ImageIndex::new();
        let records = vec![record("1", "old-boots", "PRD:Hidden,UPD:2024-01-01,MCI:77")];

        let outcome = project(&records, &context(&grouping, &images));
        assert_eq!(outcome.counts.eligible, 1);

        let case = &outcome.cases[0];
        assert_eq!(case.deletion.command, "DELETE");
        assert_eq!(case.deletion.handle, "old-boots");
        assert_eq!(case.page.handle, "old-boots");
        assert_eq!(case.page.template_suffix, "archived-goods");
        assert_eq!(case.page.group_name, "shoes");
        assert_eq!(case.page.related_collection, "bestof-shoes");
        assert_eq!(case.redirect.path, "/products/old-boots");
        assert_eq!(case.redirect.target, "/pages/old-boots");
    }

    #[test]
    fn recently_updated_record_is_retained() {
        let grouping = GroupingTable::from_pairs([("77", "shoes")]);
        let images = ImageIndex::new();
        let records = vec![record("1", "boots", "PRD:Hidden,UPD:2024-03-15,MCI:77")];

        let outcome = project(&records, &context(&grouping, &images));
        assert!(outcome.cases.is_empty());
        assert_eq!(outcome.counts.hidden, 1);
        assert_eq!(outcome.counts.eligible, 0);
        assert_eq!(outcome.counts.skipped, 0);
    }

    #[test]
    fn visible_record_never_reaches_the_staleness_check() {
        let grouping = GroupingTable::default();
        let images = ImageIndex::new();
        // Ancient but not hidden.
        let records = vec![record("1", "fresh", "UPD:2001-01-01")];

        let outcome = project(&records, &context(&grouping, &images));
        assert_eq!(outcome.counts.hidden, 0);
        assert!(outcome.cases.is_empty());
    }

    #[test]
    fn record_without_activity_markers_is_retained() {
        let grouping = GroupingTable::default();
        let images = ImageIndex::new();
        let records = vec![record("1", "quiet", "PRD:Hidden,novinka")];

        let outcome = project(&records, &context(&grouping, &images));
        assert_eq!(outcome.counts.hidden, 1);
        assert!(outcome.cases.is_empty());
    }

    #[test]
    fn corrupt_tag_date_skips_only_that_record() {
        let grouping = GroupingTable::default();
        let images = ImageIndex::new();
        let records = vec![
            record("1", "broken", "PRD:Hidden,UPD:zitra"),
            record("2", "ok", "PRD:Hidden,UPD:2024-01-01"),
        ];

        let outcome = project(&records, &context(&grouping, &images));
        assert_eq!(outcome.counts.skipped, 1);
        assert_eq!(outcome.skipped[0].code, IssueCode::BadTagDate);
        assert_eq!(outcome.skipped[0].key, "1");
        assert_eq!(outcome.cases.len(), 1);
        assert_eq!(outcome.cases[0].deletion.key, "2");
    }

    #[test]
    fn eligible_record_without_handle_is_skipped_with_issue() {
        let grouping = GroupingTable::default();
        let images = ImageIndex::new();
        let records = vec![record("1", "", "PRD:Hidden,UPD:2024-01-01")];

        let outcome = project(&records, &context(&grouping, &images));
        assert!(outcome.cases.is_empty());
        assert_eq!(outcome.skipped[0].code, IssueCode::MissingHandle);
    }

    #[test]
    fn images_flow_from_the_prebuilt_index() {
        let grouping = GroupingTable::default();
        let mut rec = record("1", "sofa", "PRD:Hidden,UPD:2024-01-01");
        rec.image_cells = vec![
            ImageCell {
                src: "late.jpg".to_string(),
                position: "2".to_string(),
            },
            ImageCell {
                src: "front.jpg".to_string(),
                position: "1".to_string(),
            },
        ];
        let records = vec![rec];
        let images = RowImageSource.images_by_key(&records).expect("index");

        let outcome = project(&records, &context(&grouping, &images));
        let page = &outcome.cases[0].page;
        assert_eq!(page.primary_image, "front.jpg");
        assert_eq!(page.additional_images, "late.jpg");
    }

    #[test]
    fn numeric_external_key_round_trips_as_an_integer_cell() {
        let grouping = GroupingTable::default();
        let images = ImageIndex::new();
        let mut numeric = record("1", "a", "PRD:Hidden,UPD:2024-01-01");
        numeric.external_key = "901".to_string();
        let mut textual = record("2", "b", "PRD:Hidden,UPD:2024-01-01");
        textual.external_key = "legacy-901".to_string();

        let outcome = project(&[numeric, textual], &context(&grouping, &images));
        let workbook = to_workbook(&outcome.cases).expect("workbook");
        let pages = workbook.sheet(SHEET_PAGES).expect("pages");

        let column = "Metafield: mf_pg_ap.Shpsys_ID [integer]";
        assert_eq!(pages[0][column], serde_json::json!(901));
        assert_eq!(pages[1][column], serde_json::json!("legacy-901"));
    }

    #[test]
    fn output_sheets_stay_aligned_by_position_and_handle() {
        let grouping = GroupingTable::default();
        let images = ImageIndex::new();
        let records = vec![
            record("3", "c", "PRD:Hidden,UPD:2023-01-01"),
            record("1", "a", "PRD:Hidden,UPD:2023-06-01"),
            record("2", "b", "PRD:Hidden,UPD:2023-03-01"),
        ];

        let outcome = project(&records, &context(&grouping, &images));
        let keys: Vec<&str> = outcome
            .cases
            .iter()
            .map(|case| case.deletion.key.as_str())
            .collect();
        assert_eq!(keys, vec!["3", "1", "2"]);

        let workbook = to_workbook(&outcome.cases).expect("workbook");
        let products = workbook.sheet(SHEET_PRODUCTS).expect("products");
        let pages = workbook.sheet(SHEET_PAGES).expect("pages");
        let redirects = workbook.sheet(SHEET_REDIRECTS).expect("redirects");
        assert_eq!(products.len(), pages.len());
        assert_eq!(pages.len(), redirects.len());
        for ((product, page), redirect) in products.iter().zip(pages).zip(redirects) {
            let handle = crate::engine::workbook::cell_text(product, "Handle");
            assert_eq!(crate::engine::workbook::cell_text(page, "Handle"), handle);
            assert_eq!(
                crate::engine::workbook::cell_text(redirect, "Path"),
                format!("/products/{handle}")
            );
        }
    }

    #[test]
    fn projection_is_idempotent() {
        let grouping = GroupingTable::from_pairs([("77", "shoes")]);
        let images = ImageIndex::new();
        let records = vec![
            record("1", "a", "PRD:Hidden,UPD:2024-01-01,MCI:77"),
            record("2", "b", "PRD:Hidden,ADD:2023-11-05"),
        ];

        let ctx = context(&grouping, &images);
        let first = to_workbook(&project(&records, &ctx).cases).expect("first");
        let second = to_workbook(&project(&records, &ctx).cases).expect("second");

        let first_bytes = serde_json::to_string_pretty(&first.sheets).expect("serialize");
        let second_bytes = serde_json::to_string_pretty(&second.sheets).expect("serialize");
        assert_eq!(first_bytes, second_bytes);
    }
}
