//! CSV records → JSON document conversion.

use sdgtool_shared::{Record, Result, SdgError, columns};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::instrument;

/// Indentation of the JSON output.
const JSON_INDENT: &[u8] = b"    ";

/// Expand the `sdgs` fields, then serialize the whole sequence.
///
/// Every record is validated before any JSON is produced, so a bad SDG token
/// never yields a partial document.
#[instrument(skip_all, fields(rows = records.len()))]
pub fn csv_to_json(records: &[Record]) -> Result<String> {
    let expanded = expand_sdgs(records)?;
    to_json(&expanded)
}

/// Replace every non-empty `sdgs` string with its integer sequence.
/// Absent or empty fields are left untouched.
pub fn expand_sdgs(records: &[Record]) -> Result<Vec<Record>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let mut record = record.clone();
            if let Some(raw) = record.get_str(columns::SDGS).filter(|s| !s.is_empty()) {
                let sdgs = parse_tokens(raw)
                    .map_err(|msg| SdgError::Conversion(format!("row {}: {msg}", index + 1)))?;
                record.insert(columns::SDGS, sdgs);
            }
            Ok(record)
        })
        .collect()
}

/// Parse a comma-separated SDG list such as `"1, 3,7"`.
pub fn parse_sdgs(raw: &str) -> Result<Vec<i64>> {
    parse_tokens(raw).map_err(SdgError::Conversion)
}

fn parse_tokens(raw: &str) -> std::result::Result<Vec<i64>, String> {
    raw.split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<i64>()
                .map_err(|_| format!("invalid SDG '{token}' in '{raw}'"))
        })
        .collect()
}

/// Serialize records as a JSON array with 4-space indentation. Non-ASCII
/// characters are written as-is.
pub fn to_json(records: &[Record]) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(JSON_INDENT));
    records
        .serialize(&mut serializer)
        .map_err(|e| SdgError::Conversion(format!("JSON serialization failed: {e}")))?;

    String::from_utf8(buf).map_err(|e| SdgError::Conversion(format!("JSON output is not UTF-8: {e}")))
}

/// Parse a JSON document produced by [`to_json`] back into records.
pub fn from_json(json: &str) -> Result<Vec<Record>> {
    serde_json::from_str(json).map_err(|e| SdgError::parse(format!("invalid record JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn parse_sdgs_trims_tokens() {
        assert_eq!(parse_sdgs("1, 3,7").unwrap(), [1, 3, 7]);
        assert_eq!(parse_sdgs(" 17 ").unwrap(), [17]);
    }

    #[test]
    fn parse_sdgs_rejects_garbage() {
        let err = parse_sdgs("1,three").unwrap_err();
        assert!(err.to_string().contains("invalid SDG 'three'"));
        assert!(parse_sdgs("1,,2").is_err());
        assert!(parse_sdgs("4;5").is_err());
    }

    #[test]
    fn empty_or_absent_sdgs_untouched() {
        let input = vec![
            record(&[("name", json!("a")), ("sdgs", json!(""))]),
            record(&[("name", json!("b"))]),
        ];
        let result = expand_sdgs(&input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn expand_reports_row_index() {
        let input = vec![
            record(&[("sdgs", json!("1"))]),
            record(&[("sdgs", json!("2, x"))]),
        ];
        let err = expand_sdgs(&input).unwrap_err();
        assert!(matches!(err, SdgError::Conversion(_)));
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn json_uses_four_spaces_and_keeps_unicode() {
        let input = vec![record(&[("name", json!("Grüne Zukunft")), ("sdgs", json!("1, 3,7"))])];
        let json = csv_to_json(&input).unwrap();
        let expected = "[\n    {\n        \"name\": \"Grüne Zukunft\",\n        \"sdgs\": [\n            1,\n            3,\n            7\n        ]\n    }\n]";
        assert_eq!(json, expected);
    }

    #[test]
    fn json_of_empty_sequence() {
        assert_eq!(csv_to_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn json_roundtrip_preserves_strings() {
        let input = vec![record(&[
            ("name", json!("Ünïcödé \"quoted\"")),
            ("homepage", json!("https://example.org")),
            ("sdgs", json!("4")),
        ])];
        let parsed = from_json(&csv_to_json(&input).unwrap()).unwrap();
        assert_eq!(parsed[0].get_str("name"), Some("Ünïcödé \"quoted\""));
        assert_eq!(parsed[0].get_str("homepage"), Some("https://example.org"));
        assert_eq!(parsed[0].get("sdgs"), Some(&json!([4])));
    }
}
