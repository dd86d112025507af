use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::text::{collapse_whitespace, content_hash, meaningful_len};

/// Candidates with fewer letters/digits than this are rejected at ingestion.
pub const MIN_MEANINGFUL_CHARS: usize = 10;

/// Length of the hash prefix used in content-derived ids.
const HASH_ID_LEN: usize = 16;

/// Stable identity of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Id derived from the text alone: `p-<first 16 hex of sha256(normalized text)>`.
    pub fn from_text(text: &str) -> Self {
        let hash = content_hash(text);
        Self(format!("p-{}", &hash[..HASH_ID_LEN]))
    }

    /// Id derived from a source-provided key, e.g. the slug at the end of a link.
    pub fn from_key(source_tag: &str, key: &str) -> Self {
        Self(format!("{source_tag}-{}", key.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Proof that an item went out: when, and the destination's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub published_at: DateTime<Utc>,
    pub reference: String,
}

/// One perla: a short snippet plus provenance and publish status.
///
/// The publish triple (`published`, `publishedAt`, `deliveryReference`) is
/// held as a single `Option<Publication>`, so a half-published item cannot
/// be constructed. Records on disk that break this are rejected on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ContentItemRecord", into = "ContentItemRecord")]
pub struct ContentItem {
    pub id: ItemId,
    pub text: String,
    pub category: Option<String>,
    pub author: Option<String>,
    pub source_url: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
    publication: Option<Publication>,
}

impl ContentItem {
    /// Validate raw text into an unpublished candidate with a content-derived id.
    pub fn candidate(text: &str) -> Result<Self, ValidationError> {
        let text = collapse_whitespace(text);
        if text.is_empty() {
            return Err(ValidationError::EmptyText);
        }
        let found = meaningful_len(&text);
        if found < MIN_MEANINGFUL_CHARS {
            return Err(ValidationError::TooShort {
                found,
                min: MIN_MEANINGFUL_CHARS,
            });
        }

        Ok(Self {
            id: ItemId::from_text(&text),
            text,
            category: None,
            author: None,
            source_url: None,
            added_at: None,
            publication: None,
        })
    }

    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = id;
        self
    }

    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = non_blank(category);
        self
    }

    pub fn with_author(mut self, author: Option<&str>) -> Self {
        self.author = non_blank(author);
        self
    }

    pub fn with_source_url(mut self, url: Option<&str>) -> Self {
        self.source_url = non_blank(url);
        self
    }

    /// Shape a candidate for its first entry into the store: stamped with
    /// the ingestion time and never carrying a publication.
    pub fn into_ingested(mut self, at: DateTime<Utc>) -> Self {
        self.added_at = Some(at);
        self.publication = None;
        self
    }

    pub fn is_published(&self) -> bool {
        self.publication.is_some()
    }

    pub fn publication(&self) -> Option<&Publication> {
        self.publication.as_ref()
    }

    /// Move to published. Returns `false` (and changes nothing) if the item
    /// was already published: the first publication is kept.
    pub fn publish(&mut self, reference: &str, at: DateTime<Utc>) -> bool {
        if self.publication.is_some() {
            return false;
        }
        self.publication = Some(Publication {
            published_at: at,
            reference: reference.to_string(),
        });
        true
    }

    /// Caption-ready attribution, e.g. "Scuola · Anna".
    pub fn attribution(&self) -> Option<String> {
        match (self.category.as_deref(), self.author.as_deref()) {
            (Some(c), Some(a)) => Some(format!("{c} · {a}")),
            (Some(c), None) => Some(c.to_string()),
            (None, Some(a)) => Some(a.to_string()),
            (None, None) => None,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// On-disk shape of a content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentItemRecord {
    id: String,
    text: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    published: bool,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    delivery_reference: Option<String>,
    #[serde(default)]
    added_at: Option<DateTime<Utc>>,
}

impl TryFrom<ContentItemRecord> for ContentItem {
    type Error = ValidationError;

    fn try_from(r: ContentItemRecord) -> Result<Self, Self::Error> {
        if r.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if r.text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }

        let publication = match (r.published, r.published_at, r.delivery_reference) {
            (false, _, _) => None,
            (true, Some(published_at), Some(reference)) => Some(Publication {
                published_at,
                reference,
            }),
            (true, None, _) => {
                return Err(ValidationError::IncompletePublication {
                    id: r.id,
                    missing: "publishedAt",
                })
            }
            (true, Some(_), None) => {
                return Err(ValidationError::IncompletePublication {
                    id: r.id,
                    missing: "deliveryReference",
                })
            }
        };

        Ok(Self {
            id: ItemId(r.id),
            text: r.text,
            category: r.category,
            author: r.author,
            source_url: r.source_url,
            added_at: r.added_at,
            publication,
        })
    }
}

impl From<ContentItem> for ContentItemRecord {
    fn from(item: ContentItem) -> Self {
        let (published, published_at, delivery_reference) = match item.publication {
            Some(p) => (true, Some(p.published_at), Some(p.reference)),
            None => (false, None, None),
        };
        Self {
            id: item.id.0,
            text: item.text,
            category: item.category,
            author: item.author,
            source_url: item.source_url,
            published,
            published_at,
            delivery_reference,
            added_at: item.added_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_rejects_short_text() {
        assert_eq!(
            ContentItem::candidate("ciao!!").unwrap_err(),
            ValidationError::TooShort { found: 4, min: MIN_MEANINGFUL_CHARS }
        );
        assert_eq!(ContentItem::candidate("   ").unwrap_err(), ValidationError::EmptyText);
    }

    #[test]
    fn candidate_id_is_deterministic() {
        let a = ContentItem::candidate("Ciao a tutti quanti").unwrap();
        let b = ContentItem::candidate("ciao a  tutti quanti").unwrap();
        assert_eq!(a.id, b.id);
        assert!(a.id.as_str().starts_with("p-"));
        assert_eq!(a.id.as_str().len(), 2 + HASH_ID_LEN);
    }

    #[test]
    fn blank_metadata_becomes_none() {
        let item = ContentItem::candidate("Buongiorno gruppo")
            .unwrap()
            .with_category(Some("  "))
            .with_author(Some(" Anna "));
        assert_eq!(item.category, None);
        assert_eq!(item.author.as_deref(), Some("Anna"));
    }

    #[test]
    fn publish_is_first_write_wins() {
        let mut item = ContentItem::candidate("Buongiorno gruppo").unwrap();
        let t1 = Utc::now();
        assert!(item.publish("ref-1", t1));
        assert!(!item.publish("ref-2", Utc::now()));

        let p = item.publication().unwrap();
        assert_eq!(p.reference, "ref-1");
        assert_eq!(p.published_at, t1);
    }

    #[test]
    fn serializes_flat_camel_case_fields() {
        let mut item = ContentItem::candidate("Buongiorno gruppo")
            .unwrap()
            .with_source_url(Some("https://example.org/p/1"));
        item.publish("telegram:-100:7", Utc::now());

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["published"], true);
        assert_eq!(json["deliveryReference"], "telegram:-100:7");
        assert!(json["publishedAt"].is_string());
        assert_eq!(json["sourceUrl"], "https://example.org/p/1");
    }

    #[test]
    fn rejects_published_record_without_reference() {
        let raw = r#"{"id":"p-1","text":"Ciao a tutti quanti","published":true,
                      "publishedAt":"2024-05-01T10:00:00Z"}"#;
        let err = serde_json::from_str::<ContentItem>(raw).unwrap_err();
        assert!(err.to_string().contains("deliveryReference"));
    }

    #[test]
    fn unpublished_record_ignores_stray_fields() {
        let raw = r#"{"id":"p-1","text":"Ciao a tutti quanti","published":false,
                      "deliveryReference":"leftover"}"#;
        let item: ContentItem = serde_json::from_str(raw).unwrap();
        assert!(!item.is_published());
    }

    #[test]
    fn attribution_joins_available_fields() {
        let item = ContentItem::candidate("Frase, con virgola e altro")
            .unwrap()
            .with_category(Some("Scuola"))
            .with_author(Some("Anna"));
        assert_eq!(item.attribution().as_deref(), Some("Scuola · Anna"));
    }
}
