use chrono::NaiveDate;
use thiserror::Error;

pub const UPDATED_PREFIX: &str = "UPD:";
pub const ADDED_PREFIX: &str = "ADD:";
pub const COLLECTION_PREFIX: &str = "MCI:";
pub const HIDDEN_LITERAL: &str = "PRD:Hidden";

/// One recognized marker from a record's comma-delimited tag string.
/// Anything else in the string is a merchandising tag and is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagToken {
    Updated(NaiveDate),
    Added(NaiveDate),
    Collection(String),
    Hidden,
}

/// Marker corruption is a hard error for the record that carries it;
/// silently skipping it would hide a broken upstream export.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("unparsable date in tag `{token}`: expected a leading YYYY-MM-DD")]
    BadDate { token: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFacts {
    pub last_activity: Option<NaiveDate>,
    pub collection_id: Option<String>,
    pub hidden: bool,
}

/// Parse the leading `YYYY-MM-DD` of a marker payload. Some exports append a
/// time-of-day after the date; everything past the tenth character is
/// ignored regardless of its separator.
fn marker_date(token: &str, payload: &str) -> Result<NaiveDate, TagError> {
    let date_part = payload.get(..10).ok_or_else(|| TagError::BadDate {
        token: token.to_string(),
    })?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| TagError::BadDate {
        token: token.to_string(),
    })
}

/// Split a tag string into typed markers. Tokens are trimmed before
/// matching; the hidden marker must equal the whole token, the other
/// markers are prefix matches.
pub fn tokenize(tags: &str) -> Result<Vec<TagToken>, TagError> {
    let mut out = Vec::new();
    for raw in tags.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        if token == HIDDEN_LITERAL {
            out.push(TagToken::Hidden);
        } else if let Some(payload) = token.strip_prefix(UPDATED_PREFIX) {
            out.push(TagToken::Updated(marker_date(token, payload)?));
        } else if let Some(payload) = token.strip_prefix(ADDED_PREFIX) {
            out.push(TagToken::Added(marker_date(token, payload)?));
        } else if let Some(payload) = token.strip_prefix(COLLECTION_PREFIX) {
            out.push(TagToken::Collection(payload.to_string()));
        }
    }
    Ok(out)
}

/// Reduce the marker sequence to the facts the classifier and resolver need:
/// the most recent `UPD:` date (falling back to the most recent `ADD:` date),
/// the first `MCI:` identifier, and the hidden flag.
pub fn parse_tags(tags: &str) -> Result<TagFacts, TagError> {
    let mut facts = TagFacts::default();
    let mut last_updated: Option<NaiveDate> = None;
    let mut last_added: Option<NaiveDate> = None;

    for token in tokenize(tags)? {
        match token {
            TagToken::Updated(date) => {
                last_updated = Some(last_updated.map_or(date, |cur| cur.max(date)));
            }
            TagToken::Added(date) => {
                last_added = Some(last_added.map_or(date, |cur| cur.max(date)));
            }
            TagToken::Collection(id) => {
                if facts.collection_id.is_none() {
                    facts.collection_id = Some(id);
                }
            }
            TagToken::Hidden => facts.hidden = true,
        }
    }

    facts.last_activity = last_updated.or(last_added);
    Ok(facts)
}
