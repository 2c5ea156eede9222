use crate::engine::record::SourceRecord;
use anyhow::Result;
use std::collections::BTreeMap;

/// One image reference for a record. `position` drives display order; it is
/// neither unique nor contiguous in real exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub url: String,
    pub position: i64,
}

/// Record key → attachments in arrival order, built once before the
/// transform and read many times.
pub type ImageIndex = BTreeMap<String, Vec<ImageAttachment>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    pub primary: String,
    pub additional: Vec<String>,
}

/// An unparsable or missing position sorts the attachment last rather than
/// dropping it; arrival order still breaks ties.
pub fn parse_position(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(i64::MAX)
}

/// Partition a record's attachments into one primary reference and an
/// ordered tail. Stable sort by position, so repeated runs over the same
/// snapshot produce identical output.
pub fn aggregate(attachments: &[ImageAttachment]) -> ImageSet {
    let mut sorted: Vec<&ImageAttachment> = attachments.iter().collect();
    sorted.sort_by_key(|attachment| attachment.position);

    let mut urls = sorted.into_iter().map(|attachment| attachment.url.clone());
    let primary = urls.next().unwrap_or_default();
    ImageSet {
        primary,
        additional: urls.collect(),
    }
}

/// Image provenance seam: the projector only ever sees an `ImageIndex`,
/// whether the attachments came pre-joined on export rows or from the PIM
/// gallery table.
pub trait ImageSource {
    fn name(&self) -> &'static str;
    fn images_by_key(&self, records: &[SourceRecord]) -> Result<ImageIndex>;
}

/// Pre-joined mode: each export row carries its own image cells, already
/// grouped onto the record during row collapse.
pub struct RowImageSource;

impl ImageSource for RowImageSource {
    fn name(&self) -> &'static str {
        "rows"
    }

    fn images_by_key(&self, records: &[SourceRecord]) -> Result<ImageIndex> {
        let mut index = ImageIndex::new();
        for record in records {
            let attachments = record
                .image_cells
                .iter()
                .map(|cell| ImageAttachment {
                    url: cell.src.clone(),
                    position: parse_position(&cell.position),
                })
                .collect();
            index.insert(record.key.clone(), attachments);
        }
        Ok(index)
    }
}
