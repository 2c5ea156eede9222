use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Per-locale mapping from `MCI:` grouping identifiers to collection
/// handles. The file is hand-maintained beside the source exports, so the
/// lenient JSON5 reader tolerates comments and trailing commas.
#[derive(Debug, Clone, Default)]
pub struct GroupingTable {
    entries: BTreeMap<String, String>,
}

impl GroupingTable {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries: BTreeMap<String, String> = json5::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Self { entries })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, group_id: &str) -> Option<&str> {
        self.entries.get(group_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingFields {
    pub group_name: String,
    pub related_collection: String,
}

/// Total function: an absent or unknown identifier degrades to empty fields
/// so the record still archives, just without collection metadata.
pub fn resolve(
    collection_id: Option<&str>,
    table: &GroupingTable,
    bestseller_prefix: &str,
) -> GroupingFields {
    let Some(group_name) = collection_id.and_then(|id| table.get(id)) else {
        return GroupingFields::default();
    };
    GroupingFields {
        group_name: group_name.to_string(),
        related_collection: format!("{bestseller_prefix}-{group_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_id_resolves_name_and_related_collection() {
        let table = GroupingTable::from_pairs([("77", "shoes")]);
        let fields = resolve(Some("77"), &table, "bestof");
        assert_eq!(fields.group_name, "shoes");
        assert_eq!(fields.related_collection, "bestof-shoes");
    }

    #[test]
    fn unknown_or_absent_id_degrades_to_empty_fields() {
        let table = GroupingTable::from_pairs([("77", "shoes")]);
        assert_eq!(resolve(Some("99"), &table, "bestof"), GroupingFields::default());
        assert_eq!(resolve(None, &table, "bestof"), GroupingFields::default());
        assert_eq!(
            resolve(Some("77"), &GroupingTable::default(), "bestof"),
            GroupingFields::default()
        );
    }

    #[test]
    fn load_accepts_lenient_json() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("collections_cz.json");
        std::fs::write(
            &path,
            "{\n  // maintained by hand\n  \"77\": \"obuv\",\n  \"12\": \"matrace\",\n}\n",
        )
        .expect("write");

        let table = GroupingTable::load(&path).expect("load");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("77"), Some("obuv"));
    }
}
