//! Core domain types: records, record sequences, and geocoding failures.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known column names, as they appear after key lowercasing.
pub mod columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const ADDRESS: &str = "address";
    pub const STREET_ADDRESS: &str = "street_address";
    pub const WEBSITE: &str = "website";
    pub const DOMAIN: &str = "domain";
    pub const HOMEPAGE: &str = "homepage";
    pub const COVER_IMAGE_ID: &str = "cover_image_id";
    pub const SDGS: &str = "sdgs";
}

/// Placeholder used in failure reports when a row has no `name`.
pub const UNKNOWN_NAME: &str = "Unknown name";

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One row of tabular data: an ordered mapping from column name to value.
///
/// Column order is insertion order. Re-inserting an existing key keeps its
/// position; removing and inserting a key moves it to the end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// All records of one file, in original row order.
pub type RecordSeq = Vec<Record>;

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The value of `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether `key` holds something other than null, an empty string or an
    /// empty sequence. Absent columns count as blank.
    pub fn has_value(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    /// Insert or overwrite a column. Existing columns keep their position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a column, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render every value to the text it would have in a CSV cell.
    pub fn into_text(self) -> Self {
        self.0
            .into_iter()
            .map(|(k, v)| {
                let text = value_to_text(&v);
                (k, Value::String(text))
            })
            .collect()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// CSV cell text for a value: null is empty, sequences are comma-joined.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Geocoding failures
// ---------------------------------------------------------------------------

/// Why a row could not be geocoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The provider found no location for the address.
    UnknownAddress,
    /// The provider did not answer within the timeout.
    Timeout,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAddress => f.write_str("Unknown address(format?)"),
            Self::Timeout => f.write_str("Timeout"),
        }
    }
}

/// A structured note describing why one row could not be geocoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// 1-based position in the original sequence.
    pub row_index: usize,
    pub reason: FailureReason,
    /// The row's `name`, or [`UNKNOWN_NAME`].
    pub name: String,
    pub street_address: String,
}

/// Renders the failure report line: `[Row 3] Timeout: Acme - Main St 1`.
impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Row {}] {}: {} - {}",
            self.row_index, self.reason, self.name, self.street_address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn remove_then_insert_moves_column_to_end() {
        let mut r = record(&[("a", json!("1")), ("b", json!("2")), ("c", json!("3"))]);
        let v = r.remove("a").unwrap();
        r.insert("a", v);
        let keys: Vec<&String> = r.keys().collect();
        assert_eq!(keys, ["b", "c", "a"]);
    }

    #[test]
    fn insert_existing_keeps_position() {
        let mut r = record(&[("a", json!("1")), ("b", json!("2"))]);
        r.insert("a", "9");
        let keys: Vec<&String> = r.keys().collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(r.get_str("a"), Some("9"));
    }

    #[test]
    fn has_value_treats_empty_as_blank() {
        let r = record(&[
            ("empty", json!("")),
            ("null", Value::Null),
            ("text", json!("x")),
            ("num", json!(0.0)),
        ]);
        assert!(!r.has_value("empty"));
        assert!(!r.has_value("null"));
        assert!(!r.has_value("missing"));
        assert!(r.has_value("text"));
        assert!(r.has_value("num"));
    }

    #[test]
    fn into_text_renders_csv_cells() {
        let r = record(&[
            ("id", json!(4)),
            ("latitude", json!(37.4)),
            ("longitude", Value::Null),
            ("sdgs", json!([1, 3, 7])),
        ])
        .into_text();
        assert_eq!(r.get_str("id"), Some("4"));
        assert_eq!(r.get_str("latitude"), Some("37.4"));
        assert_eq!(r.get_str("longitude"), Some(""));
        assert_eq!(r.get_str("sdgs"), Some("1,3,7"));
    }

    #[test]
    fn failure_line_format() {
        let failure = FailureRecord {
            row_index: 3,
            reason: FailureReason::UnknownAddress,
            name: "Acme".into(),
            street_address: "Nowhere 1".into(),
        };
        assert_eq!(
            failure.to_string(),
            "[Row 3] Unknown address(format?): Acme - Nowhere 1"
        );
    }
}
