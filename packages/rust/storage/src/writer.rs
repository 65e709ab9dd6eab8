//! Output writers. Every file is written to a temp sibling first and then
//! renamed into place, so an aborted run never leaves a partial output.

use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use sdgtool_shared::{FailureRecord, Record, Result, SdgError, value_to_text};
use tracing::{debug, info, instrument, warn};

/// Write records as a comma-delimited UTF-8 CSV file.
#[instrument(skip_all, fields(path = %path.display(), rows = records.len()))]
pub fn write_csv(path: &Path, records: &[Record]) -> Result<()> {
    if records.is_empty() {
        warn!("no records to write, output will be empty");
    }
    let content = render_csv(records)?;
    write_atomic(path, &content)?;
    info!("wrote CSV");
    Ok(())
}

/// Render records as CSV text.
///
/// The header is the union of all columns in first-seen order, so a column
/// added to only some rows (e.g. `cover_image_id`) is still written. Cells of
/// rows lacking a column are empty.
pub fn render_csv(records: &[Record]) -> Result<String> {
    let columns = column_union(records);
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(&columns)
        .map_err(|e| SdgError::parse(format!("failed to write CSV header: {e}")))?;

    for (index, record) in records.iter().enumerate() {
        let row: Vec<String> = columns
            .iter()
            .map(|column| record.get(column).map(value_to_text).unwrap_or_default())
            .collect();
        writer
            .write_record(&row)
            .map_err(|e| SdgError::parse(format!("failed to write CSV row {}: {e}", index + 1)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SdgError::parse(format!("failed to flush CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| SdgError::parse(format!("CSV output is not UTF-8: {e}")))
}

/// Write a JSON (or any text) document.
#[instrument(skip_all, fields(path = %path.display(), bytes = content.len()))]
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content)?;
    info!("wrote file");
    Ok(())
}

/// Write several rendered documents together.
///
/// Every document is staged to its temp sibling before any of them is
/// renamed into place. If staging fails, the temps already written are
/// removed and no target is touched.
#[instrument(skip_all, fields(files = outputs.len()))]
pub fn write_all(outputs: &[(&Path, &str)]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(outputs.len());
    for &(path, content) in outputs {
        let temp = temp_sibling(path);
        if let Err(e) = std::fs::write(&temp, content) {
            discard(&staged);
            return Err(SdgError::io(&temp, e));
        }
        staged.push((temp, path));
    }

    for (index, (temp, path)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(temp, path) {
            discard(&staged[index..]);
            return Err(SdgError::io(*path, e));
        }
        debug!(path = %path.display(), "renamed temp file into place");
    }
    Ok(())
}

/// Render failure lines as `[Row {index}] {reason}: {name} - {street_address}`.
pub fn render_failure_report(failures: &[FailureRecord]) -> String {
    failures.iter().map(|f| format!("{f}\n")).collect()
}

fn column_union(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    write_all(&[(path, content)])
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (temp, _) in staged {
        let _ = std::fs::remove_file(temp);
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
