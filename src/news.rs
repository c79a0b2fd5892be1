//! # News items and result sets
//!
//! `CanonicalItem` is what survives the relevance gate; `ResultSet` is the bounded,
//! newest-first collection a run produces and the store persists.
//!
//! The JSON shape (`title`, `link`, `source`, `isoDate`, `summary`; `items`,
//! `updatedAt` in unix millis) is what existing consumers of the news endpoint read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on the number of items in a result set.
pub const DEFAULT_MAX_ITEMS: usize = 200;

pub const PLACEHOLDER_TITLE: &str = "No matching news found";
pub const PLACEHOLDER_SUMMARY: &str =
    "None of the tracked sources currently carry coverage matching the filters. The list refreshes automatically.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalItem {
    pub title: String,
    pub link: String,
    /// Normalized publisher host (lowercase, no `www.`).
    #[serde(rename = "source")]
    pub domain: String,
    #[serde(rename = "isoDate", default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl CanonicalItem {
    /// Sentinel substituted when a run produces nothing.
    pub fn placeholder(now: DateTime<Utc>) -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            link: String::new(),
            domain: String::new(),
            published: Some(now),
            summary: Some(PLACEHOLDER_SUMMARY.to_string()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.link.is_empty() && self.domain.is_empty() && self.title == PLACEHOLDER_TITLE
    }

    /// Ranking key in unix millis; undated items rank as the epoch.
    pub fn sort_key(&self) -> i64 {
        self.published.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSet {
    pub items: Vec<CanonicalItem>,
    #[serde(rename = "updatedAt", with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Default for ResultSet {
    /// What a store returns before anything was ever written: `{ items: [], updatedAt: 0 }`.
    fn default() -> Self {
        Self {
            items: Vec::new(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl ResultSet {
    pub fn is_placeholder(&self) -> bool {
        self.items.len() == 1 && self.items[0].is_placeholder()
    }
}

/// Finalize a deduplicated, newest-first sequence: cap it at `max_items`, fall back to
/// the sentinel when empty, stamp it with `now`.
pub fn build_result_set(
    mut unique: Vec<CanonicalItem>,
    max_items: usize,
    now: DateTime<Utc>,
) -> ResultSet {
    unique.truncate(max_items);
    if unique.is_empty() {
        unique.push(CanonicalItem::placeholder(now));
    }
    ResultSet {
        items: unique,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(n: usize) -> CanonicalItem {
        CanonicalItem {
            title: format!("story {n}"),
            link: format!("https://apnews.com/article/{n}"),
            domain: "apnews.com".into(),
            published: None,
            summary: None,
        }
    }

    #[test]
    fn empty_input_yields_single_placeholder() {
        let now = Utc.with_ymd_and_hms(2025, 10, 6, 12, 0, 0).unwrap();
        let rs = build_result_set(vec![], DEFAULT_MAX_ITEMS, now);
        assert_eq!(rs.items.len(), 1);
        assert!(rs.is_placeholder());
        assert_eq!(rs.items[0].published, Some(now));
        assert_eq!(rs.updated_at, now);
    }

    #[test]
    fn truncates_to_cap_and_keeps_order() {
        let items: Vec<_> = (0..250).map(item).collect();
        let rs = build_result_set(items, DEFAULT_MAX_ITEMS, Utc::now());
        assert_eq!(rs.items.len(), 200);
        assert_eq!(rs.items[0].title, "story 0");
        assert_eq!(rs.items[199].title, "story 199");
        assert!(!rs.is_placeholder());
    }

    #[test]
    fn default_serializes_like_an_empty_store() {
        let v = serde_json::to_value(ResultSet::default()).unwrap();
        assert_eq!(v, serde_json::json!({ "items": [], "updatedAt": 0 }));
    }

    #[test]
    fn item_json_uses_consumer_field_names() {
        let it = CanonicalItem {
            published: Some(Utc.with_ymd_and_hms(2025, 10, 6, 10, 0, 0).unwrap()),
            summary: Some("s".into()),
            ..item(1)
        };
        let v = serde_json::to_value(&it).unwrap();
        assert_eq!(v["source"], "apnews.com");
        assert_eq!(v["isoDate"], "2025-10-06T10:00:00Z");
        assert!(v.get("domain").is_none());

        let bare = serde_json::to_value(item(2)).unwrap();
        assert!(bare.get("isoDate").is_none());
        assert!(bare.get("summary").is_none());
    }
}
