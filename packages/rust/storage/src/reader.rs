//! CSV loading: BOM stripping, delimiter detection, header-keyed records.

use std::path::Path;

use csv::ReaderBuilder;
use sdgtool_shared::{Record, RecordSeq, Result, SdgError};
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Delimiters the reader will consider, in tie-break order.
const DELIMITER_CANDIDATES: [u8; 2] = [b',', b';'];

/// Number of leading lines sampled for delimiter detection.
const SAMPLE_LINES: usize = 10;

/// Read a CSV file into a record sequence.
///
/// The file must be UTF-8 (a leading BOM is ignored) and start with a header
/// row. The delimiter is detected from the first lines.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_csv(path: &Path) -> Result<RecordSeq> {
    let content = std::fs::read_to_string(path).map_err(|e| SdgError::io(path, e))?;
    let records = parse_csv(&content, path)?;
    info!(rows = records.len(), "loaded CSV");
    Ok(records)
}

/// Parse CSV text into a record sequence. `origin` only labels error messages.
pub fn parse_csv(content: &str, origin: &Path) -> Result<RecordSeq> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = detect_delimiter(content);
    debug!(delimiter = %(delimiter as char), "detected delimiter");

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SdgError::parse(format!("{}: failed to read header: {e}", origin.display())))?
        .clone();

    if headers.is_empty() {
        return Err(SdgError::validation(format!(
            "{}: missing header row",
            origin.display()
        )));
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            SdgError::parse(format!("{}: row {}: {e}", origin.display(), index + 1))
        })?;

        // Short rows read as null for the missing cells; surplus cells are dropped.
        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = row
                    .get(i)
                    .map_or(Value::Null, |cell| Value::String(cell.to_string()));
                (header.to_string(), value)
            })
            .collect();
        records.push(record);
    }

    Ok(records)
}

/// Pick `,` or `;` for the sample at the top of `content`.
///
/// A candidate must occur in the header. The winner is the candidate whose
/// per-line count equals the header's on the most sample lines, so commas
/// inside free-text cells cannot outvote a consistent `;`. The
/// `avg / (1 + stddev)` score only breaks ties. Delimiters inside double
/// quotes are not counted. Falls back to `,`.
pub fn detect_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect();

    let mut best_delimiter = DELIMITER_CANDIDATES[0];
    let mut best_rank = (0usize, 0.0f32);

    for &delimiter in &DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| count_unquoted(line, delimiter))
            .collect();

        let Some(&header_count) = counts.first().filter(|&&c| c > 0) else {
            continue;
        };
        let consistent = counts.iter().filter(|&&c| c == header_count).count();

        let avg = counts.iter().sum::<usize>() as f32 / counts.len() as f32;
        let variance = counts
            .iter()
            .map(|&c| (c as f32 - avg).powi(2))
            .sum::<f32>()
            / counts.len() as f32;
        let score = avg / (1.0 + variance.sqrt());

        if consistent > best_rank.0 || (consistent == best_rank.0 && score > best_rank.1) {
            best_rank = (consistent, score);
            best_delimiter = delimiter;
        }
    }

    best_delimiter
}

/// Count `delimiter` bytes outside double-quoted sections of one line.
fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> &'static Path {
        Path::new("inline.csv")
    }

    #[test]
    fn detect_comma_and_semicolon() {
        assert_eq!(detect_delimiter("a,b,c\nd,e,f"), b',');
        assert_eq!(detect_delimiter("a;b;c\nd;e;f"), b';');
    }

    #[test]
    fn detect_semicolon_with_decimal_commas() {
        let content = "Name;Latitude;Longitude\nAcme;52,5;13,4\nBeta;48,1;11,5\n";
        assert_eq!(detect_delimiter(content), b';');
    }

    #[test]
    fn detect_semicolon_with_comma_heavy_cells() {
        let mut content = String::from("Name;Description;SDGs\n");
        for i in 1..=12 {
            content.push_str(&format!(
                "Org {i};Water, sanitation, schools, clinics, roads and farms;1, 3, 6, 11, 17\n"
            ));
        }
        assert_eq!(detect_delimiter(&content), b';');

        let records = parse_csv(&content, origin()).unwrap();
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, ["Name", "Description", "SDGs"]);
        assert_eq!(records[11].get_str("SDGs"), Some("1, 3, 6, 11, 17"));
    }

    #[test]
    fn detect_ignores_quoted_delimiters() {
        let content = "name,sdgs\n\"A; B\",\"1, 3, 7\"\n\"C\",\"2\"\n";
        assert_eq!(detect_delimiter(content), b',');
        assert_eq!(count_unquoted("\"a,b\",c", b','), 1);
    }

    #[test]
    fn detect_defaults_to_comma() {
        assert_eq!(detect_delimiter("single\nvalue\n"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[test]
    fn parse_keeps_header_order_and_values() {
        let records = parse_csv("Name,Website,SDGs\nAcme,acme.org,\"1, 3\"\n", origin()).unwrap();
        assert_eq!(records.len(), 1);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, ["Name", "Website", "SDGs"]);
        assert_eq!(records[0].get_str("SDGs"), Some("1, 3"));
    }

    #[test]
    fn parse_strips_bom() {
        let records = parse_csv("\u{feff}name;city\nAcme;Köln\n", origin()).unwrap();
        assert_eq!(records[0].get_str("name"), Some("Acme"));
        assert_eq!(records[0].get_str("city"), Some("Köln"));
    }

    #[test]
    fn short_rows_read_as_null() {
        let records = parse_csv("a,b,c\n1,2\n", origin()).unwrap();
        assert_eq!(records[0].get_str("a"), Some("1"));
        assert_eq!(records[0].get("c"), Some(&Value::Null));
    }

    #[test]
    fn header_only_yields_no_records() {
        let records = parse_csv("a,b\n", origin()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn read_missing_file_names_path() {
        let err = read_csv(Path::new("/nonexistent/sdgtool/input.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sdgtool/input.csv"));
    }
}
