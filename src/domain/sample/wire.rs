//! Wire types for the pull feed (HTTP data service).

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::shared::serde_util::number_text;

/// Response of a "last K entries" request.
///
/// Entries arrive oldest-first (most recent last).
#[derive(Deserialize, Debug, Clone, Default)]
pub struct FeedResponse {
    #[serde(default)]
    pub feeds: Vec<FeedEntry>,
}

/// A single feed entry. Data fields are keyed by a selector name
/// (`"value"`, `"field1"`, …) chosen in configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct FeedEntry {
    pub created_at: String,
    #[serde(default)]
    pub entry_id: Option<u64>,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl FeedEntry {
    /// Raw text of the selected field, if present and string/number typed.
    pub fn field(&self, selector: &str) -> Option<String> {
        self.fields.get(selector).and_then(number_text)
    }
}

/// Body of an outbound command POST (pull transport).
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct CommandBody {
    pub command: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_response_parses_selector_fields() {
        let json = r#"{
            "channel": {"id": 42},
            "feeds": [
                {"created_at": "2024-05-01T10:00:00Z", "entry_id": 7, "field1": "26.1", "field2": null},
                {"created_at": "2024-05-01T10:00:15Z", "entry_id": 8, "field1": 26.4}
            ]
        }"#;
        let resp: FeedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.feeds.len(), 2);
        assert_eq!(resp.feeds[0].entry_id, Some(7));
        assert_eq!(resp.feeds[0].field("field1").as_deref(), Some("26.1"));
        assert_eq!(resp.feeds[0].field("field2"), None);
        assert_eq!(resp.feeds[1].field("field1").as_deref(), Some("26.4"));
    }

    #[test]
    fn test_feed_response_missing_feeds_is_empty() {
        let resp: FeedResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.feeds.is_empty());
    }
}
