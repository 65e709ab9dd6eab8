//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use sdgtool_core::normalize::NormalizeMode;
use sdgtool_core::pipeline::{
    ConvertConfig, GeocodeConfig, GeocodeResult, NormalizeConfig, ProgressReporter, RunConfig,
};
use sdgtool_geocoding::NominatimClient;
use sdgtool_shared::{
    AppConfig, GeocodingConfig, init_config, load_config, load_config_from, validate_geocoding,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sdgtool: normalize, enrich, geocode and convert SDG project listings.
#[derive(Parser)]
#[command(
    name = "sdgtool",
    version,
    about = "Normalize, enrich, geocode and convert SDG project-listing CSV files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.sdgtool/sdgtool.toml.
    #[arg(long, global = true, env = "SDGTOOL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands. Each stage is an independent invocation.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Lowercase columns, assign ids, fix coordinates, rename fields.
    Normalize {
        /// Input CSV file (`,` or `;` delimited).
        input: PathBuf,

        /// Output CSV file.
        output: PathBuf,

        /// Normalize mode: all or minimal (defaults to the config value).
        mode: Option<NormalizeMode>,

        /// Cover-image CSV with name, domain and cover_image_id columns.
        cover: Option<PathBuf>,
    },

    /// Add latitude/longitude to rows that lack them.
    Geocode {
        /// Input CSV file with a street_address column.
        input: PathBuf,

        /// Output CSV file.
        output: PathBuf,

        /// Text file receiving one line per row that could not be geocoded.
        failures: Option<PathBuf>,

        /// Per-request timeout in seconds (overrides config).
        #[arg(long)]
        timeout: Option<u64>,

        /// Geocoding API base URL (overrides config).
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Convert a CSV file to JSON, expanding the sdgs column.
    Convert {
        /// Input CSV file.
        input: PathBuf,

        /// Output JSON file.
        output: PathBuf,
    },

    /// Run normalize, geocode and convert in one go.
    Run {
        /// Input CSV file.
        input: PathBuf,

        /// Output JSON file.
        output: PathBuf,

        /// Normalize mode: all or minimal (defaults to the config value).
        #[arg(short, long)]
        mode: Option<NormalizeMode>,

        /// Cover-image CSV (all mode only).
        #[arg(long)]
        cover: Option<PathBuf>,

        /// Also write the geocoded CSV here.
        #[arg(long)]
        csv_out: Option<PathBuf>,

        /// Failure report path.
        #[arg(long)]
        failures: Option<PathBuf>,

        /// Per-request timeout in seconds (overrides config).
        #[arg(long)]
        timeout: Option<u64>,

        /// Geocoding API base URL (overrides config).
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout only
/// carries command summaries.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sdgtool=info",
        1 => "sdgtool=debug",
        _ => "sdgtool=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Normalize {
            input,
            output,
            mode,
            cover,
        } => cmd_normalize(config_path, input, output, mode, cover),
        Command::Geocode {
            input,
            output,
            failures,
            timeout,
            base_url,
        } => cmd_geocode(config_path, input, output, failures, timeout, base_url).await,
        Command::Convert { input, output } => cmd_convert(input, output),
        Command::Run {
            input,
            output,
            mode,
            cover,
            csv_out,
            failures,
            timeout,
            base_url,
        } => {
            let opts = RunOptions {
                input,
                output,
                mode,
                cover,
                csv_out,
                failures,
                timeout,
                base_url,
            };
            cmd_run(config_path, opts).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load the config file named on the command line, or the default one.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

fn resolve_mode(config: &AppConfig, mode: Option<NormalizeMode>) -> Result<NormalizeMode> {
    match mode {
        Some(mode) => Ok(mode),
        None => config
            .defaults
            .mode
            .parse()
            .wrap_err("invalid [defaults] mode in config"),
    }
}

/// Apply CLI overrides to the `[geocoding]` section and validate it.
fn resolve_geocoding(
    config: &AppConfig,
    timeout: Option<u64>,
    base_url: Option<String>,
) -> Result<GeocodingConfig> {
    let mut geocoding = config.geocoding.clone();
    if let Some(secs) = timeout {
        geocoding.timeout_secs = secs;
    }
    if let Some(url) = base_url {
        geocoding.base_url = url;
    }
    validate_geocoding(&geocoding)?;
    Ok(geocoding)
}

// ---------------------------------------------------------------------------
// Stage handlers
// ---------------------------------------------------------------------------

fn cmd_normalize(
    config_path: Option<&Path>,
    input: PathBuf,
    output: PathBuf,
    mode: Option<NormalizeMode>,
    cover: Option<PathBuf>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mode = resolve_mode(&config, mode)?;

    info!(input = %input.display(), output = %output.display(), %mode, "normalizing");

    let normalize_config = NormalizeConfig {
        input,
        output,
        mode,
        cover,
    };
    let result = sdgtool_core::pipeline::normalize_file(&normalize_config)?;

    println!();
    println!("  Normalized {} rows ({mode} mode)", result.rows);
    if let Some(matched) = result.cover_matches {
        println!("  Cover images: {matched} matched");
    }
    println!("  Output: {}", normalize_config.output.display());
    println!("  Time:   {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_geocode(
    config_path: Option<&Path>,
    input: PathBuf,
    output: PathBuf,
    failures: Option<PathBuf>,
    timeout: Option<u64>,
    base_url: Option<String>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let geocoding = resolve_geocoding(&config, timeout, base_url)?;
    let client = NominatimClient::new(&geocoding)?;

    info!(
        input = %input.display(),
        provider = %client.search_url(),
        timeout_secs = geocoding.timeout_secs,
        "geocoding"
    );

    let geocode_config = GeocodeConfig {
        input,
        output,
        failures,
        timeout: geocoding.timeout(),
    };

    let reporter = CliProgress::new();
    let result = sdgtool_core::pipeline::geocode_file(&geocode_config, &client, &reporter).await?;

    println!();
    print_geocode_summary(&result);
    println!("  Output:   {}", geocode_config.output.display());
    if let Some(path) = &geocode_config.failures {
        println!("  Failures: {}", path.display());
    }
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_convert(input: PathBuf, output: PathBuf) -> Result<()> {
    info!(input = %input.display(), output = %output.display(), "converting to JSON");

    let convert_config = ConvertConfig { input, output };
    let result = sdgtool_core::pipeline::convert_file(&convert_config)?;

    println!("JSON data has been saved to '{}' ({} rows)", convert_config.output.display(), result.rows);

    Ok(())
}

/// Arguments of the `run` subcommand.
struct RunOptions {
    input: PathBuf,
    output: PathBuf,
    mode: Option<NormalizeMode>,
    cover: Option<PathBuf>,
    csv_out: Option<PathBuf>,
    failures: Option<PathBuf>,
    timeout: Option<u64>,
    base_url: Option<String>,
}

async fn cmd_run(config_path: Option<&Path>, opts: RunOptions) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mode = resolve_mode(&config, opts.mode)?;
    let geocoding = resolve_geocoding(&config, opts.timeout, opts.base_url)?;
    let client = NominatimClient::new(&geocoding)?;

    info!(input = %opts.input.display(), %mode, "running full pipeline");

    let run_config = RunConfig {
        input: opts.input,
        output_json: opts.output,
        mode,
        cover: opts.cover,
        csv_output: opts.csv_out,
        failures: opts.failures,
        timeout: geocoding.timeout(),
    };

    let reporter = CliProgress::new();
    let result = sdgtool_core::pipeline::run_pipeline(&run_config, &client, &reporter).await?;

    println!();
    println!("  Pipeline finished ({mode} mode)");
    if let Some(matched) = result.cover_matches {
        println!("  Cover images: {matched} matched");
    }
    print_geocode_summary(&result.geocode);
    println!("  JSON:     {}", run_config.output_json.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn print_geocode_summary(result: &GeocodeResult) {
    println!("  Rows:     {}", result.rows);
    println!("  Resolved: {}", result.resolved);
    println!("  Failed:   {}", result.failed);
    println!("  Skipped:  {} (already had coordinates)", result.skipped);
    println!("  No address: {}", result.without_address);
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn row_geocoding(&self, row_index: usize, total: usize, address: &str) {
        self.spinner
            .set_message(format!("Geocoding [{row_index}/{total}] {address}"));
    }

    fn done(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Config handlers
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
