//! Field normalization passes over a record sequence.
//!
//! Each pass is a pure function `&[Record] -> Vec<Record>` applied in
//! sequence. Order matters: id assignment checks for a lowercase `id`
//! column, so it must run after [`lowercase_keys`].

use std::fmt;
use std::str::FromStr;

use sdgtool_shared::{Record, SdgError, columns};
use serde_json::Value;
use tracing::{debug, instrument};

/// Which passes [`normalize`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMode {
    /// Every pass, including the website and address renames.
    #[default]
    All,
    /// Lowercase keys, ids and coordinate fix-up only.
    Minimal,
}

impl FromStr for NormalizeMode {
    type Err = SdgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "minimal" => Ok(Self::Minimal),
            other => Err(SdgError::validation(format!(
                "invalid mode '{other}': expected 'all' or 'minimal'"
            ))),
        }
    }
}

impl fmt::Display for NormalizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Minimal => f.write_str("minimal"),
        }
    }
}

/// Run the normalization passes for `mode`.
#[instrument(skip_all, fields(rows = records.len(), %mode))]
pub fn normalize(records: &[Record], mode: NormalizeMode) -> Vec<Record> {
    let mut result = lowercase_keys(records);
    result = assign_sequential_id(&result);
    result = normalize_coordinate_decimal(&result);

    if mode == NormalizeMode::All {
        result = derive_domain_and_homepage(&result);
        result = rename_address_field(&result);
    }

    debug!("normalization passes complete");
    result
}

// ---------------------------------------------------------------------------
// Pass 1: Lowercase column names
// ---------------------------------------------------------------------------

/// Lowercase every column name. If two names collide, the later value wins
/// and the column keeps the position of the first.
pub fn lowercase_keys(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            record
                .iter()
                .map(|(key, value)| (key.to_lowercase(), value.clone()))
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 2: Sequential ids
// ---------------------------------------------------------------------------

/// Append an `id` column numbered 1..N unless the sequence already has one.
pub fn assign_sequential_id(records: &[Record]) -> Vec<Record> {
    let has_id = records
        .first()
        .is_some_and(|first| first.contains_key(columns::ID));
    if has_id {
        return records.to_vec();
    }

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let mut record = record.clone();
            record.insert(columns::ID, (index + 1) as u64);
            record
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 3: Decimal separator in coordinates
// ---------------------------------------------------------------------------

/// Replace `,` with `.` in `latitude` and `longitude` text. The result is not
/// checked to be a number.
pub fn normalize_coordinate_decimal(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            for column in [columns::LATITUDE, columns::LONGITUDE] {
                if let Some(text) = record.get_str(column) {
                    let fixed = text.replace(',', ".");
                    record.insert(column, fixed);
                }
            }
            record
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 4: website -> domain + homepage
// ---------------------------------------------------------------------------

/// Move `website` to a new `domain` column and derive `homepage` from it.
pub fn derive_domain_and_homepage(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if let Some(website) = record.remove(columns::WEBSITE) {
                let homepage = match website.as_str() {
                    Some(domain) => Value::String(homepage_for(domain)),
                    None => website.clone(),
                };
                record.insert(columns::DOMAIN, website);
                record.insert(columns::HOMEPAGE, homepage);
            }
            record
        })
        .collect()
}

/// `https://` + domain, unless the domain is empty or already starts with it.
pub fn homepage_for(domain: &str) -> String {
    if domain.is_empty() || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

// ---------------------------------------------------------------------------
// Pass 5: address -> street_address
// ---------------------------------------------------------------------------

/// Rename `address` to `street_address`, keeping the value.
pub fn rename_address_field(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if let Some(address) = record.remove(columns::ADDRESS) {
                record.insert(columns::STREET_ADDRESS, address);
            }
            record
        })
        .collect()
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

    fn keys(record: &Record) -> Vec<&str> {
        record.keys().map(String::as_str).collect()
    }

    #[test]
    fn lowercase_keys_keeps_values() {
        let input = vec![record(&[("Name", json!("Acme")), ("SDGs", json!("1,2"))])];
        let result = lowercase_keys(&input);
        assert_eq!(keys(&result[0]), ["name", "sdgs"]);
        assert_eq!(result[0].get_str("name"), Some("Acme"));
    }

    #[test]
    fn lowercase_keys_is_idempotent() {
        let input = vec![
            record(&[("Name", json!("Acme")), ("LATITUDE", json!("1,5"))]),
            record(&[("Name", json!("Beta")), ("LATITUDE", json!(""))]),
        ];
        let once = lowercase_keys(&input);
        let twice = lowercase_keys(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn lowercase_collision_later_value_wins() {
        let input = vec![record(&[("Name", json!("first")), ("NAME", json!("second"))])];
        let result = lowercase_keys(&input);
        assert_eq!(result[0].len(), 1);
        assert_eq!(result[0].get_str("name"), Some("second"));
    }

    #[test]
    fn assign_ids_in_row_order() {
        let input = vec![
            record(&[("name", json!("a"))]),
            record(&[("name", json!("b"))]),
            record(&[("name", json!("c"))]),
        ];
        let result = assign_sequential_id(&input);
        let ids: Vec<u64> = result
            .iter()
            .map(|r| r.get("id").and_then(Value::as_u64).unwrap())
            .collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(keys(&result[0]), ["name", "id"]);
    }

    #[test]
    fn assign_ids_never_overwrites() {
        let input = vec![
            record(&[("id", json!("42")), ("name", json!("a"))]),
            record(&[("id", json!("7")), ("name", json!("b"))]),
        ];
        let result = assign_sequential_id(&input);
        assert_eq!(result, input);
    }

    #[test]
    fn assign_ids_on_empty_sequence() {
        assert!(assign_sequential_id(&[]).is_empty());
    }

    #[test]
    fn assign_ids_needs_lowercase_first() {
        let input = vec![record(&[("ID", json!("9"))])];
        let result = assign_sequential_id(&lowercase_keys(&input));
        assert_eq!(result[0].get_str("id"), Some("9"));
    }

    #[test]
    fn coordinate_commas_become_periods() {
        let input = vec![record(&[
            ("latitude", json!("52,52")),
            ("longitude", json!("13,40")),
            ("note", json!("a,b")),
        ])];
        let result = normalize_coordinate_decimal(&input);
        assert_eq!(result[0].get_str("latitude"), Some("52.52"));
        assert_eq!(result[0].get_str("longitude"), Some("13.40"));
        assert_eq!(result[0].get_str("note"), Some("a,b"));
    }

    #[test]
    fn coordinate_fix_is_pure_substitution() {
        for raw in ["1,2,3", "", "n/a", ",,", "52.1"] {
            let input = vec![record(&[("latitude", json!(raw))])];
            let fixed = normalize_coordinate_decimal(&input);
            let out = fixed[0].get_str("latitude").unwrap();
            let commas = raw.matches(',').count();
            assert_eq!(out.len(), raw.len());
            assert_eq!(out.matches(',').count(), 0);
            assert_eq!(out.matches('.').count(), raw.matches('.').count() + commas);
        }
    }

    #[test]
    fn coordinate_fix_skips_null() {
        let input = vec![record(&[("latitude", Value::Null)])];
        let result = normalize_coordinate_decimal(&input);
        assert_eq!(result[0].get("latitude"), Some(&Value::Null));
    }

    #[test]
    fn homepage_derivation() {
        assert_eq!(homepage_for("example.org"), "https://example.org");
        assert_eq!(homepage_for("https://example.org"), "https://example.org");
        assert_eq!(homepage_for(""), "");
    }

    #[test]
    fn website_becomes_domain_and_homepage() {
        let input = vec![
            record(&[("website", json!("acme.org")), ("name", json!("Acme"))]),
            record(&[("website", json!("")), ("name", json!("Beta"))]),
        ];
        let result = derive_domain_and_homepage(&input);
        assert_eq!(keys(&result[0]), ["name", "domain", "homepage"]);
        assert_eq!(result[0].get_str("domain"), Some("acme.org"));
        assert_eq!(result[0].get_str("homepage"), Some("https://acme.org"));
        assert_eq!(result[1].get_str("homepage"), Some(""));
    }

    #[test]
    fn website_rename_noop_without_column() {
        let input = vec![record(&[("name", json!("Acme"))])];
        assert_eq!(derive_domain_and_homepage(&input), input);
    }

    #[test]
    fn address_renamed_to_street_address() {
        let input = vec![record(&[("address", json!("Main St 1")), ("name", json!("Acme"))])];
        let result = rename_address_field(&input);
        assert_eq!(keys(&result[0]), ["name", "street_address"]);
        assert_eq!(result[0].get_str("street_address"), Some("Main St 1"));

        let untouched = vec![record(&[("name", json!("Acme"))])];
        assert_eq!(rename_address_field(&untouched), untouched);
    }

    #[test]
    fn minimal_mode_skips_renames() {
        let input = vec![record(&[
            ("Name", json!("Acme")),
            ("Website", json!("acme.org")),
            ("Address", json!("Main St 1")),
            ("Latitude", json!("1,5")),
        ])];
        let result = normalize(&input, NormalizeMode::Minimal);
        assert_eq!(keys(&result[0]), ["name", "website", "address", "latitude", "id"]);
        assert_eq!(result[0].get_str("latitude"), Some("1.5"));
    }

    #[test]
    fn all_mode_applies_every_pass() {
        let input = vec![record(&[
            ("Name", json!("Acme")),
            ("Website", json!("acme.org")),
            ("Address", json!("Main St 1")),
        ])];
        let result = normalize(&input, NormalizeMode::All);
        assert_eq!(keys(&result[0]), ["name", "id", "domain", "homepage", "street_address"]);
        assert_eq!(result[0].get("id"), Some(&json!(1)));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("all".parse::<NormalizeMode>().unwrap(), NormalizeMode::All);
        assert_eq!("minimal".parse::<NormalizeMode>().unwrap(), NormalizeMode::Minimal);
        let err = "full".parse::<NormalizeMode>().unwrap_err();
        assert!(err.to_string().contains("invalid mode 'full'"));
    }
}
