//! Cover-image cross-referencing.
//!
//! A [`LookupTable`] is built once from the secondary (cover) records and
//! then used to tag primary records with a `cover_image_id`.

use std::collections::HashMap;

use sdgtool_shared::{Record, columns};
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Normalized name/domain → cover image id.
///
/// Name keys and domain keys share one namespace. A later registration for
/// the same key replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    entries: HashMap<String, Value>,
}

impl LookupTable {
    /// Register every secondary record under its non-empty `name` and
    /// `domain`, in order.
    #[instrument(skip_all, fields(rows = secondary.len()))]
    pub fn build(secondary: &[Record]) -> Self {
        let mut entries = HashMap::new();

        for record in secondary {
            let cover_id = record
                .get(columns::COVER_IMAGE_ID)
                .cloned()
                .unwrap_or(Value::Null);

            for column in [columns::NAME, columns::DOMAIN] {
                if let Some(raw) = record.get_str(column).filter(|s| !s.is_empty()) {
                    entries.insert(lookup_key(raw), cover_id.clone());
                }
            }
        }

        debug!(keys = entries.len(), "cover lookup table built");
        Self { entries }
    }

    /// Look up a raw name or domain.
    pub fn get(&self, raw: &str) -> Option<&Value> {
        self.entries.get(&lookup_key(raw))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Set `cover_image_id` on every primary record that matches the table.
///
/// The record's `name` is tried first; its `domain` only when the name is not
/// a key at all. Records without a non-empty match are left without the column.
#[instrument(skip_all, fields(rows = primary.len(), keys = table.len()))]
pub fn enrich(primary: &[Record], table: &LookupTable) -> Vec<Record> {
    let mut matched = 0usize;

    let result = primary
        .iter()
        .map(|record| {
            let mut record = record.clone();
            let hit = record
                .get_str(columns::NAME)
                .and_then(|name| table.get(name))
                .or_else(|| record.get_str(columns::DOMAIN).and_then(|d| table.get(d)))
                .filter(|id| is_present(id))
                .cloned();

            if let Some(cover_id) = hit {
                record.insert(columns::COVER_IMAGE_ID, cover_id);
                matched += 1;
            }
            record
        })
        .collect();

    info!(matched, "cover images matched");
    result
}

fn lookup_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
