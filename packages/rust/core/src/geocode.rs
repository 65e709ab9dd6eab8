//! Coordinate enrichment through an injected [`Geocoder`].
//!
//! Records are processed strictly one after another. Each record without
//! coordinates but with a `street_address` costs exactly one provider call;
//! timeouts and misses are recorded as [`FailureRecord`]s and the run goes on.

use std::time::Duration;

use sdgtool_geocoding::{GeocodeError, Geocoder};
use sdgtool_shared::{
    FailureReason, FailureRecord, Record, RecordSeq, Result, UNKNOWN_NAME, columns,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for [`geocode_records`].
#[derive(Debug, Clone)]
pub struct GeocodeOptions {
    /// Timeout handed to the provider for every request.
    pub timeout: Duration,
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Progress callback invoked before each provider request.
pub trait GeocodeProgress {
    fn request(&self, row_index: usize, total: usize, address: &str);
}

/// Progress sink that ignores every event.
pub struct NoProgress;

impl GeocodeProgress for NoProgress {
    fn request(&self, _row_index: usize, _total: usize, _address: &str) {}
}

/// Outcome of a geocoding pass.
#[derive(Debug, Clone, Default)]
pub struct GeocodeReport {
    /// The enriched records, in input order.
    pub records: RecordSeq,
    /// One entry per row the provider could not resolve.
    pub failures: Vec<FailureRecord>,
    /// Rows that received coordinates.
    pub resolved: usize,
    /// Rows that already had both coordinates.
    pub skipped: usize,
    /// Rows left alone because they have no street address.
    pub without_address: usize,
}

/// Fill in `latitude`/`longitude` for records that lack them.
///
/// Provider errors other than a timeout abort the whole pass.
#[instrument(skip_all, fields(rows = records.len(), timeout_ms = options.timeout.as_millis()))]
pub async fn geocode_records<G: Geocoder>(
    records: &[Record],
    geocoder: &G,
    options: &GeocodeOptions,
    progress: &dyn GeocodeProgress,
) -> Result<GeocodeReport> {
    let total = records.len();
    let mut report = GeocodeReport {
        records: Vec::with_capacity(total),
        ..GeocodeReport::default()
    };

    for (index, record) in records.iter().enumerate() {
        let row_index = index + 1;
        let mut record = record.clone();

        if record.has_value(columns::LATITUDE) && record.has_value(columns::LONGITUDE) {
            report.skipped += 1;
            report.records.push(record);
            continue;
        }

        let Some(address) = record
            .get_str(columns::STREET_ADDRESS)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
        else {
            debug!(row = row_index, "no street address, leaving row unchanged");
            report.without_address += 1;
            report.records.push(record);
            continue;
        };

        progress.request(row_index, total, &address);

        let reason = match geocoder.geocode(&address, options.timeout).await {
            Ok(Some(location)) => {
                record.insert(columns::LATITUDE, location.latitude);
                record.insert(columns::LONGITUDE, location.longitude);
                report.resolved += 1;
                report.records.push(record);
                continue;
            }
            Ok(None) => FailureReason::UnknownAddress,
            Err(GeocodeError::Timeout(_)) => FailureReason::Timeout,
            Err(GeocodeError::Provider(e)) => return Err(e),
        };

        record.insert(columns::LATITUDE, Value::Null);
        record.insert(columns::LONGITUDE, Value::Null);

        let failure = FailureRecord {
            row_index,
            reason,
            name: failure_name(&record),
            street_address: address,
        };
        warn!(row = row_index, %reason, address = %failure.street_address, "could not geocode row");
        report.failures.push(failure);
        report.records.push(record);
    }

    info!(
        resolved = report.resolved,
        failed = report.failures.len(),
        skipped = report.skipped,
        without_address = report.without_address,
        "geocoding complete"
    );

    Ok(report)
}

/// The row's `name` as written, or [`UNKNOWN_NAME`] when the column is absent.
fn failure_name(record: &Record) -> String {
    record
        .get_str(columns::NAME)
        .unwrap_or(UNKNOWN_NAME)
        .to_string()
}
