use crate::engine::handle::handleize;
use crate::engine::images::{ImageAttachment, ImageIndex, ImageSource, parse_position};
use crate::engine::record::SourceRecord;
use crate::engine::workbook::{Row, cell_text};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// `fetch(table_name) -> rows` contract over the PIM auxiliary store.
pub trait TableFetch {
    fn fetch(&self, table: &str) -> Result<Vec<Row>>;
}

/// Live mode: the PIM export endpoint serves each table as a JSON array.
pub struct HttpTableFetch {
    base_url: String,
    token: Option<String>,
    timeout_secs: u64,
}

impl HttpTableFetch {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            timeout_secs,
        }
    }
}

impl TableFetch for HttpTableFetch {
    fn fetch(&self, table: &str) -> Result<Vec<Row>> {
        let url = format!("{}/export/{table}", self.base_url.trim_end_matches('/'));
        let client = Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("failed to build PIM http client")?;

        let mut request = client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .with_context(|| format!("failed to fetch {url}"))?;
        if !response.status().is_success() {
            anyhow::bail!("PIM export {url} returned {}", response.status());
        }

        response
            .json::<Vec<Row>>()
            .with_context(|| format!("invalid PIM payload from {url}"))
    }
}

/// Offline mode: a directory of `{table}.json` dumps, used for tests and
/// air-gapped runs against a saved export.
pub struct SnapshotTableFetch {
    dir: PathBuf,
}

impl SnapshotTableFetch {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TableFetch for SnapshotTableFetch {
    fn fetch(&self, table: &str) -> Result<Vec<Row>> {
        let path = self.dir.join(format!("{table}.json"));
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Auxiliary-image provenance: gallery rows carry `good` (the record's
/// external PIM key), `id` (image id) and `pos`. Image URLs are derived
/// from the record's title, not stored in the gallery.
pub struct GalleryImageSource {
    fetch: Box<dyn TableFetch>,
    table: String,
    image_base_url: String,
}

impl GalleryImageSource {
    pub fn new(
        fetch: Box<dyn TableFetch>,
        table: impl Into<String>,
        image_base_url: impl Into<String>,
    ) -> Self {
        Self {
            fetch,
            table: table.into(),
            image_base_url: image_base_url.into(),
        }
    }

    fn image_url(&self, title: &str, image_id: &str) -> String {
        format!(
            "{}/{}-original-{image_id}.jpg",
            self.image_base_url.trim_end_matches('/'),
            handleize(title)
        )
    }
}

impl ImageSource for GalleryImageSource {
    fn name(&self) -> &'static str {
        "gallery"
    }

    fn images_by_key(&self, records: &[SourceRecord]) -> Result<ImageIndex> {
        let rows = self.fetch.fetch(&self.table)?;

        // good → (image id, position) in gallery arrival order.
        let mut by_good: BTreeMap<String, Vec<(String, i64)>> = BTreeMap::new();
        for row in &rows {
            let good = cell_text(row, "good");
            if good.trim().is_empty() {
                continue;
            }
            by_good.entry(good).or_default().push((
                cell_text(row, "id"),
                parse_position(&cell_text(row, "pos")),
            ));
        }

        let mut index = ImageIndex::new();
        for record in records {
            let attachments = if record.external_key.trim().is_empty() {
                Vec::new()
            } else {
                by_good
                    .get(&record.external_key)
                    .map(|entries| {
                        entries
                            .iter()
                            .map(|(image_id, position)| ImageAttachment {
                                url: self.image_url(&record.title, image_id),
                                position: *position,
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            };
            index.insert(record.key.clone(), attachments);
        }
        Ok(index)
    }
}
