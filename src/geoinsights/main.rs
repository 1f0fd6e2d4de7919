//! GeoInsights command line.
//!
//! Analyzes a POI spreadsheet, compares two of them, or geocodes addresses,
//! and writes the resulting reports as CSV or XLSX.

mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geoinsights::analysis::{analyze, analyze_with_geocoder, AnalysisOptions};
use geoinsights::compare::compare_datasets;
use geoinsights::config::Config;
use geoinsights::error::GeocodeError;
use geoinsights::export;
use geoinsights::geocoding::{
    geocode_rows, geocode_rows_verified, BatchControl, CancelFlag, NominatimClient, ReverseGeocoder,
    ReversePlace,
};
use geoinsights::models::{DatasetSide, GeoPoint, MatchPolicy};
use geoinsights::normalize::ColumnMapping;
use geoinsights::pip::PipService;
use geoinsights::tabular::read_table;

use crate::output::{print_json, progress_bar, write_rows};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "geoinsights")]
#[command(about = "Validate, deduplicate and match point-of-interest spreadsheets")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify the points of one dataset
    Analyze(AnalyzeArgs),
    /// Match the points of two datasets
    Compare(CompareArgs),
    /// Derive coordinates from address columns
    Geocode(GeocodeArgs),
}

#[derive(Args, Debug, Clone)]
struct MappingArgs {
    /// Latitude column
    #[arg(long)]
    lat: Option<String>,

    /// Longitude column
    #[arg(long)]
    lon: Option<String>,

    /// Declared state column
    #[arg(long)]
    state: Option<String>,

    /// Declared city column
    #[arg(long)]
    city: Option<String>,

    /// Name column (geocoding query)
    #[arg(long)]
    name: Option<String>,

    /// Address column (geocoding query)
    #[arg(long)]
    address: Option<String>,
}

impl MappingArgs {
    fn mapping(&self) -> ColumnMapping {
        ColumnMapping {
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            state: self.state.clone(),
            city: self.city.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Input file (.csv or .xlsx)
    #[arg(short, long)]
    input: PathBuf,

    #[command(flatten)]
    columns: MappingArgs,

    /// Skip the invalid-coordinate report
    #[arg(long)]
    no_invalid: bool,

    /// Skip exact-overlap detection
    #[arg(long)]
    no_duplicates: bool,

    /// Detect proximity clusters
    #[arg(long)]
    proximity: bool,

    /// Proximity threshold in meters (overrides the config file)
    #[arg(long)]
    proximity_threshold: Option<f64>,

    /// Check declared state/city against the coordinates
    #[arg(long)]
    geographic: bool,

    /// Use state/city boundaries from this OSM PBF instead of Nominatim
    #[arg(long)]
    offline_boundaries: Option<PathBuf>,

    /// Problematic points report
    #[arg(long)]
    problems: Option<PathBuf>,

    /// Full report over every point
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print metrics as JSON
    #[arg(long)]
    summary_json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PolicyArg {
    Exact,
    Nearest,
    Radius,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum BaseArg {
    A,
    B,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Dataset A
    #[arg(long)]
    a: PathBuf,

    /// Dataset B
    #[arg(long)]
    b: PathBuf,

    /// Column mapping for A (and for B unless overridden)
    #[command(flatten)]
    columns: MappingArgs,

    /// Latitude column of B
    #[arg(long)]
    lat_b: Option<String>,

    /// Longitude column of B
    #[arg(long)]
    lon_b: Option<String>,

    /// Dataset driving the search
    #[arg(long, value_enum, default_value = "a")]
    base: BaseArg,

    #[arg(long, value_enum, default_value = "exact")]
    policy: PolicyArg,

    /// Neighbour count for `nearest` (default 1), meters for `radius` (default 100)
    #[arg(long)]
    value: Option<f64>,

    /// Comparison report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print aggregates as JSON
    #[arg(long)]
    summary_json: bool,
}

#[derive(Args, Debug)]
struct GeocodeArgs {
    /// Input file (.csv or .xlsx)
    #[arg(short, long)]
    input: PathBuf,

    #[command(flatten)]
    columns: MappingArgs,

    /// Reverse-geocode found coordinates and compare with state/city
    #[arg(long)]
    verify: bool,

    /// Use state/city boundaries from this OSM PBF for verification
    #[arg(long)]
    offline_boundaries: Option<PathBuf>,

    /// Geocoding report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print counts as JSON
    #[arg(long)]
    summary_json: bool,
}

/// Reverse geocoder chosen at startup.
enum Reverse {
    Online(NominatimClient),
    Offline(PipService),
}

impl ReverseGeocoder for Reverse {
    async fn reverse_geocode(&self, location: GeoPoint) -> std::result::Result<ReversePlace, GeocodeError> {
        match self {
            Reverse::Online(client) => client.reverse_geocode(location).await,
            Reverse::Offline(pip) => pip.reverse_geocode(location).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => Config::default(),
    };

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current row");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Analyze(args) => run_analyze(args, &config, cancel).await,
        Command::Compare(args) => run_compare(args, cancel),
        Command::Geocode(args) => run_geocode(args, &config, cancel).await,
    }
}

fn reverse_geocoder(config: &Config, offline: Option<&Path>) -> Result<(Reverse, BatchControl)> {
    let offline = offline.or(config.boundaries.pbf_path.as_deref());
    match offline {
        Some(path) => {
            let pip = PipService::from_pbf(path, config.boundaries.levels)
                .with_context(|| format!("Failed to load boundaries from {}", path.display()))?;
            // Local lookups need no pacing
            let control = config.geocoder.batch_control().with_delay(Duration::ZERO);
            Ok((Reverse::Offline(pip), control))
        }
        None => {
            let client = NominatimClient::new(&config.geocoder)
                .context("Failed to create Nominatim client")?;
            Ok((Reverse::Online(client), config.geocoder.batch_control()))
        }
    }
}

async fn run_analyze(args: AnalyzeArgs, config: &Config, cancel: CancelFlag) -> Result<()> {
    let table = read_table(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let mapping = args.columns.mapping();

    let options = AnalysisOptions {
        check_invalid: !args.no_invalid,
        check_duplicates: !args.no_duplicates,
        check_proximity: args.proximity,
        check_geographic: args.geographic,
        proximity_threshold_m: args
            .proximity_threshold
            .or(config.analysis.proximity_threshold_m),
    };

    let report = if options.check_geographic {
        let (geocoder, control) = reverse_geocoder(config, args.offline_boundaries.as_deref())?;
        let control = control
            .with_cancel(cancel)
            .with_progress(progress_bar("Checking locations")?);
        analyze_with_geocoder(&table, &mapping, &options, &geocoder, &control).await?
    } else {
        analyze(&table, &mapping, &options)?
    };

    if report.interrupted {
        warn!("Analysis interrupted; exporting the {} rows processed", report.points.len());
    }

    write_rows(&export::problems_report(&report), args.problems.as_deref(), "Problem report")?;
    write_rows(&export::full_report(&report), args.report.as_deref(), "Full report")?;

    if args.summary_json {
        print_json(&json!({
            "metrics": report.metrics,
            "groups": report.groups,
            "interrupted": report.interrupted,
        }))?;
    }
    Ok(())
}

fn match_policy(policy: PolicyArg, value: Option<f64>) -> Result<MatchPolicy> {
    let policy = match policy {
        PolicyArg::Exact => MatchPolicy::ExactCell,
        PolicyArg::Nearest => {
            let n = value.unwrap_or(1.0);
            if n.fract() != 0.0 || n < 1.0 {
                bail!("--value for nearest must be a positive integer, got {}", n);
            }
            MatchPolicy::nearest(n as usize)?
        }
        PolicyArg::Radius => MatchPolicy::radius(value.unwrap_or(100.0))?,
    };
    Ok(policy)
}

fn run_compare(args: CompareArgs, cancel: CancelFlag) -> Result<()> {
    let policy = match_policy(args.policy, args.value)?;

    let a = read_table(&args.a).with_context(|| format!("Failed to read {}", args.a.display()))?;
    let b = read_table(&args.b).with_context(|| format!("Failed to read {}", args.b.display()))?;

    let mapping_a = args.columns.mapping();
    // B only contributes coordinates to the match
    let mut mapping_b = mapping_a.coordinates_only();
    if args.lat_b.is_some() {
        mapping_b.lat = args.lat_b.clone();
    }
    if args.lon_b.is_some() {
        mapping_b.lon = args.lon_b.clone();
    }

    let base = match args.base {
        BaseArg::A => DatasetSide::A,
        BaseArg::B => DatasetSide::B,
    };

    let control = BatchControl::immediate()
        .with_cancel(cancel)
        .with_progress(progress_bar("Matching")?);
    let result = compare_datasets(&a, &mapping_a, &b, &mapping_b, base, policy, &control)?;

    if result.interrupted {
        warn!("Comparison interrupted; exporting partial matches");
    }

    write_rows(&export::comparison_report(&result), args.output.as_deref(), "Comparison report")?;

    if args.summary_json {
        print_json(&json!({
            "base": result.base_side,
            "policy": result.policy,
            "records": result.records.len(),
            "totalBasePoints": result.total_base_points,
            "matchedBasePoints": result.matched_base_points,
            "sameSquareMeterMatches": result.same_square_matches().len(),
            "interrupted": result.interrupted,
        }))?;
    }
    Ok(())
}

async fn run_geocode(args: GeocodeArgs, config: &Config, cancel: CancelFlag) -> Result<()> {
    let table = read_table(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let mapping = args.columns.mapping();

    let client = NominatimClient::new(&config.geocoder).context("Failed to create Nominatim client")?;
    let control = config
        .geocoder
        .batch_control()
        .with_cancel(cancel)
        .with_progress(progress_bar("Geocoding")?);

    let report = if args.verify {
        let reverse = match args.offline_boundaries.as_deref().or(config.boundaries.pbf_path.as_deref()) {
            Some(path) => Reverse::Offline(
                PipService::from_pbf(path, config.boundaries.levels)
                    .with_context(|| format!("Failed to load boundaries from {}", path.display()))?,
            ),
            None => Reverse::Online(client.clone()),
        };
        geocode_rows_verified(&table, &mapping, &client, &reverse, &control).await?
    } else {
        geocode_rows(&table, &mapping, &client, &control).await?
    };

    info!(
        "{} of {} rows geocoded{}",
        report.found(),
        report.rows.len(),
        if report.interrupted { " (interrupted)" } else { "" }
    );

    write_rows(&export::geocoding_report(&report), args.output.as_deref(), "Geocoding report")?;

    if args.summary_json {
        print_json(&json!({
            "rows": report.rows.len(),
            "found": report.found(),
            "failed": report.failed(),
            "interrupted": report.interrupted,
        }))?;
    }
    Ok(())
}
