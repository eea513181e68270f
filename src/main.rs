//! CLI entry point for the EcoMap ETL tool.
//!
//! Converts the consolidated waste-declaration spreadsheet into the GeoJSON
//! layer used by the map, and analyzes a generated layer around a location.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ecomap_etl::aggregate::convert;
use ecomap_etl::analyzers::analyzer::analyze_location;
use ecomap_etl::analyzers::types::Location;
use ecomap_etl::config::{self, ColumnConfig};
use ecomap_etl::geojson::FeatureCollection;
use ecomap_etl::output::{log_sample, write_collection};
use ecomap_etl::table::Table;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "ecomap_etl")]
#[command(about = "Builds the EcoMap establishment layer from SINADER data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a spreadsheet (xlsx/xls/ods/csv) into a GeoJSON FeatureCollection
    Convert {
        /// Input spreadsheet [env: ECOMAP_INPUT]
        #[arg(short, long)]
        input: Option<String>,

        /// Output GeoJSON file [env: ECOMAP_OUTPUT]
        #[arg(short, long)]
        output: Option<String>,

        /// JSON file overriding the fixed column names
        #[arg(short, long)]
        columns: Option<String>,

        /// Gzip-compress the output (".gz" is appended to the path)
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Summarize the establishments around a location
    Analyze {
        /// GeoJSON file produced by `convert`
        #[arg(short, long)]
        geojson: Option<String>,

        /// Latitude of the location
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude of the location
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Search radius in kilometres
        #[arg(short, long, default_value_t = 3.0)]
        radius: f64,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ecomap_etl.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ecomap_etl.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            columns,
            gzip,
        } => {
            let columns = match columns {
                Some(path) => ColumnConfig::load(&path)?,
                None => ColumnConfig::default(),
            };
            run_convert(
                &config::input_path(input),
                &config::output_path(output),
                &columns,
                gzip,
            )?;
        }
        Commands::Analyze {
            geojson,
            lat,
            lon,
            radius,
        } => {
            let path = config::output_path(geojson);
            run_analyze(&path, Location { lat, lng: lon }, radius)?;
        }
    }

    Ok(())
}

/// Loads, aggregates and writes the establishment layer.
#[tracing::instrument(skip(columns), fields(input = %input.display(), output = %output.display()))]
fn run_convert(input: &Path, output: &Path, columns: &ColumnConfig, gzip: bool) -> Result<PathBuf> {
    info!("Reading input file");
    let table = Table::load(input)?;

    let (collection, stats) = convert(&table, columns)?;
    let written = write_collection(output, &collection, gzip)?;

    info!(
        total_rows = stats.total_rows,
        valid_rows = stats.valid_rows,
        establishments = stats.establishments,
        residue_column = stats.residue_column.as_deref().unwrap_or("-"),
        "Conversion finished"
    );
    log_sample(&collection);

    Ok(written)
}

/// Prints the location report for `path` as pretty JSON on stdout.
#[tracing::instrument(fields(path = %path.display(), lat = origin.lat, lng = origin.lng))]
fn run_analyze(path: &Path, origin: Location, radius_km: f64) -> Result<()> {
    let collection = FeatureCollection::load(path)?;

    match analyze_location(origin, &collection, radius_km) {
        Some(report) => {
            let json = serde_json::to_string_pretty(&report)
                .context("failed to serialize location report")?;
            println!("{json}");
        }
        None => warn!("No establishments in the layer, nothing to analyze"),
    }

    Ok(())
}
