//! File-level stage runners: `normalize`, `geocode`, `convert`, and the
//! chained `run` pipeline.
//!
//! Every runner reads its whole input, transforms it in memory, and only then
//! writes output files.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sdgtool_geocoding::Geocoder;
use sdgtool_shared::{Record, RecordSeq, Result, columns};
use tracing::{info, instrument, warn};

use crate::convert;
use crate::crossref::{self, LookupTable};
use crate::geocode::{self, GeocodeOptions, GeocodeProgress, GeocodeReport};
use crate::normalize::{self, NormalizeMode};

/// Progress callback for reporting stage status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a row is sent to the geocoding provider.
    fn row_geocoding(&self, row_index: usize, total: usize, address: &str);
    /// Called when the stage completes.
    fn done(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_geocoding(&self, _row_index: usize, _total: usize, _address: &str) {}
    fn done(&self) {}
}

/// Calls [`ProgressReporter::done`] when dropped, on success and error paths
/// alike.
struct FinishOnDrop<'a>(&'a dyn ProgressReporter);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

/// Adapts a `ProgressReporter` to the `GeocodeProgress` interface.
struct PipelineGeocodeProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl GeocodeProgress for PipelineGeocodeProgress<'_> {
    fn request(&self, row_index: usize, total: usize, address: &str) {
        self.inner.row_geocoding(row_index, total, address);
    }
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// Configuration for [`normalize_file`].
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: NormalizeMode,
    /// Cover-image CSV; only used in [`NormalizeMode::All`].
    pub cover: Option<PathBuf>,
}

/// Result of [`normalize_file`].
#[derive(Debug)]
pub struct NormalizeResult {
    pub rows: usize,
    /// Rows that received a `cover_image_id`, when a cover file was applied.
    pub cover_matches: Option<usize>,
    pub elapsed: Duration,
}

/// Read, normalize, optionally cross-reference cover images, write CSV.
#[instrument(skip_all, fields(input = %config.input.display(), mode = %config.mode))]
pub fn normalize_file(config: &NormalizeConfig) -> Result<NormalizeResult> {
    let start = Instant::now();

    let records = sdgtool_storage::read_csv(&config.input)?;
    let (records, cover_matches) =
        normalize_records(&records, config.mode, config.cover.as_deref())?;

    sdgtool_storage::write_csv(&config.output, &records)?;

    let result = NormalizeResult {
        rows: records.len(),
        cover_matches,
        elapsed: start.elapsed(),
    };
    info!(rows = result.rows, elapsed_ms = result.elapsed.as_millis(), "normalize complete");
    Ok(result)
}

/// Normalize passes plus the optional cover lookup.
fn normalize_records(
    records: &[Record],
    mode: NormalizeMode,
    cover: Option<&Path>,
) -> Result<(RecordSeq, Option<usize>)> {
    let records = normalize::normalize(records, mode);

    let Some(cover_path) = cover else {
        return Ok((records, None));
    };

    if mode == NormalizeMode::Minimal {
        warn!(cover = %cover_path.display(), "cover file ignored in minimal mode");
        return Ok((records, None));
    }

    let (records, matched) = apply_cover(&records, cover_path)?;
    Ok((records, Some(matched)))
}

/// Tag records with `cover_image_id` from the cover CSV at `cover_path`.
///
/// The cover file's headers are lowercased first, like the primary input.
pub fn apply_cover(records: &[Record], cover_path: &Path) -> Result<(RecordSeq, usize)> {
    let cover = normalize::lowercase_keys(&sdgtool_storage::read_csv(cover_path)?);
    let table = LookupTable::build(&cover);
    let enriched = crossref::enrich(records, &table);

    let matched = records
        .iter()
        .zip(&enriched)
        .filter(|(before, after)| before.get(columns::COVER_IMAGE_ID) != after.get(columns::COVER_IMAGE_ID))
        .count();

    Ok((enriched, matched))
}

// ---------------------------------------------------------------------------
// geocode
// ---------------------------------------------------------------------------

/// Configuration for [`geocode_file`].
#[derive(Debug, Clone)]
pub struct GeocodeConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Where to write the failure report, if anywhere.
    pub failures: Option<PathBuf>,
    pub timeout: Duration,
}

/// Result of [`geocode_file`] and the geocoding phase of [`run_pipeline`].
#[derive(Debug)]
pub struct GeocodeResult {
    pub rows: usize,
    pub resolved: usize,
    pub failed: usize,
    pub skipped: usize,
    pub without_address: usize,
    pub elapsed: Duration,
}

impl GeocodeResult {
    fn from_report(report: &GeocodeReport, start: Instant) -> Self {
        Self {
            rows: report.records.len(),
            resolved: report.resolved,
            failed: report.failures.len(),
            skipped: report.skipped,
            without_address: report.without_address,
            elapsed: start.elapsed(),
        }
    }
}

/// Read, geocode rows lacking coordinates, write CSV and the failure report.
#[instrument(skip_all, fields(input = %config.input.display()))]
pub async fn geocode_file<G: Geocoder>(
    config: &GeocodeConfig,
    geocoder: &G,
    progress: &dyn ProgressReporter,
) -> Result<GeocodeResult> {
    let start = Instant::now();
    let finish = FinishOnDrop(progress);

    progress.phase("Reading input");
    let records = sdgtool_storage::read_csv(&config.input)?;

    progress.phase("Geocoding addresses");
    let options = GeocodeOptions {
        timeout: config.timeout,
    };
    let report = geocode::geocode_records(
        &records,
        geocoder,
        &options,
        &PipelineGeocodeProgress { inner: progress },
    )
    .await?;

    progress.phase("Writing output");
    let csv = sdgtool_storage::render_csv(&report.records)?;
    let failures = sdgtool_storage::render_failure_report(&report.failures);
    let mut outputs = vec![(config.output.as_path(), csv.as_str())];
    if let Some(path) = &config.failures {
        outputs.push((path.as_path(), failures.as_str()));
    }
    sdgtool_storage::write_all(&outputs)?;

    let result = GeocodeResult::from_report(&report, start);
    drop(finish);
    info!(
        resolved = result.resolved,
        failed = result.failed,
        elapsed_ms = result.elapsed.as_millis(),
        "geocode complete"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

/// Configuration for [`convert_file`].
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Result of [`convert_file`].
#[derive(Debug)]
pub struct ConvertResult {
    pub rows: usize,
    pub elapsed: Duration,
}

/// Read CSV, expand `sdgs`, write the JSON document.
#[instrument(skip_all, fields(input = %config.input.display()))]
pub fn convert_file(config: &ConvertConfig) -> Result<ConvertResult> {
    let start = Instant::now();

    let records = sdgtool_storage::read_csv(&config.input)?;
    let json = convert::csv_to_json(&records)?;
    sdgtool_storage::write_text(&config.output, &json)?;

    let result = ConvertResult {
        rows: records.len(),
        elapsed: start.elapsed(),
    };
    info!(rows = result.rows, elapsed_ms = result.elapsed.as_millis(), "convert complete");
    Ok(result)
}

// ---------------------------------------------------------------------------
// run: normalize → cover → geocode → convert
// ---------------------------------------------------------------------------

/// Configuration for [`run_pipeline`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output_json: PathBuf,
    pub mode: NormalizeMode,
    pub cover: Option<PathBuf>,
    /// Also write the geocoded CSV here.
    pub csv_output: Option<PathBuf>,
    pub failures: Option<PathBuf>,
    pub timeout: Duration,
}

/// Result of [`run_pipeline`].
#[derive(Debug)]
pub struct RunResult {
    pub cover_matches: Option<usize>,
    pub geocode: GeocodeResult,
    pub elapsed: Duration,
}

/// Run every stage in memory and write all outputs at the end.
///
/// Values are rendered to their CSV text before conversion, so the JSON is
/// the same as running `normalize`, `geocode` and `convert` one by one.
#[instrument(skip_all, fields(input = %config.input.display(), mode = %config.mode))]
pub async fn run_pipeline<G: Geocoder>(
    config: &RunConfig,
    geocoder: &G,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let finish = FinishOnDrop(progress);

    progress.phase("Reading input");
    let records = sdgtool_storage::read_csv(&config.input)?;

    progress.phase("Normalizing");
    let (records, cover_matches) =
        normalize_records(&records, config.mode, config.cover.as_deref())?;

    progress.phase("Geocoding addresses");
    let geocode_start = Instant::now();
    let options = GeocodeOptions {
        timeout: config.timeout,
    };
    let report = geocode::geocode_records(
        &records,
        geocoder,
        &options,
        &PipelineGeocodeProgress { inner: progress },
    )
    .await?;
    let geocode_result = GeocodeResult::from_report(&report, geocode_start);

    progress.phase("Converting to JSON");
    let text_records: RecordSeq = report.records.iter().cloned().map(Record::into_text).collect();
    let json = convert::csv_to_json(&text_records)?;

    progress.phase("Writing output");
    let csv = match &config.csv_output {
        Some(_) => sdgtool_storage::render_csv(&report.records)?,
        None => String::new(),
    };
    let failures = sdgtool_storage::render_failure_report(&report.failures);
    let mut outputs = Vec::with_capacity(3);
    if let Some(path) = &config.csv_output {
        outputs.push((path.as_path(), csv.as_str()));
    }
    if let Some(path) = &config.failures {
        outputs.push((path.as_path(), failures.as_str()));
    }
    outputs.push((config.output_json.as_path(), json.as_str()));
    sdgtool_storage::write_all(&outputs)?;

    let result = RunResult {
        cover_matches,
        geocode: geocode_result,
        elapsed: start.elapsed(),
    };
    drop(finish);
    info!(
        rows = result.geocode.rows,
        failed = result.geocode.failed,
        elapsed_ms = result.elapsed.as_millis(),
        "pipeline complete"
    );
    Ok(result)
}
