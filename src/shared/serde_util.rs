//! Custom serde helpers for feed wire formats.

use serde_json::Value;

/// Text form of a numeric field that the data service may send either as a
/// JSON string (`"26.4"`) or a JSON number.
///
/// `null`, objects, arrays and booleans yield `None` rather than failing the
/// whole document, so a single bad entry cannot poison a poll cycle.
pub fn number_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses an ISO-8601 / RFC 3339 timestamp into UTC.
pub fn parse_rfc3339(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}
