//! Seasonal imagery export CLI.
//!
//! Builds the grouped imagery tree of one region of interest, resolves a
//! single collection by group keys and season or date range, and exports
//! every image of it, then follows the export tasks until they settle.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use catalog::{InMemoryCatalog, LocalExporter};
use exporter::{
    load_registry, monitor_tasks, parse_dimensions, DateQuery, ExportParams, ImageryRequest,
    ImagerySession, MonitorOptions,
};
use imagery_common::{CrsCode, ImageryError, MosaicWindow};

/// Dates on the command line are `yyyymmdd`.
const CLI_DATE_FORMAT: &str = "%Y%m%d";

#[derive(Parser, Debug)]
#[command(name = "imagery-export")]
#[command(about = "Export seasonal, grouped satellite imagery for a region of interest")]
struct Args {
    /// ROI registry file
    #[arg(long, env = "IMAGERY_CONFIG", default_value = "config/rois.yaml")]
    config: PathBuf,

    /// Region of interest (case-insensitive)
    #[arg(long, env = "IMAGERY_ROI")]
    roi: String,

    /// Collection short name, e.g. S1 or S2
    #[arg(short = 'i', long)]
    collection: Option<String>,

    /// Export resolution in metres per pixel
    #[arg(short = 'r', long)]
    resolution: Option<f64>,

    /// Export dimensions as WIDTHxHEIGHT; overrides --resolution
    #[arg(long)]
    dimensions: Option<String>,

    /// Nested group keys separated by '_', e.g. EW_HH
    #[arg(short = 'k', long)]
    keys: Option<String>,

    /// Bands to export separated by '_', e.g. B2_B3_B4
    #[arg(short = 'b', long)]
    bands: Option<String>,

    /// Configured season name
    #[arg(short = 'y', long)]
    season: Option<String>,

    /// Start of an ad-hoc date range (yyyymmdd)
    #[arg(short = 's', long)]
    start_date: Option<String>,

    /// End of an ad-hoc date range (yyyymmdd)
    #[arg(short = 'e', long)]
    end_date: Option<String>,

    /// Mosaic images by hour, day, week or month
    #[arg(long)]
    mosaic_window: Option<MosaicWindow>,

    /// Catalog snapshot (JSON)
    #[arg(long, env = "IMAGERY_CATALOG", default_value = "config/catalog.json")]
    catalog: PathBuf,

    /// Root directory for exported files
    #[arg(long, env = "IMAGERY_OUTPUT_DIR", default_value = "exports")]
    output_dir: PathBuf,

    /// Output folder below --output-dir (default: <roi>/<collection>_<season>/<keys>)
    #[arg(long)]
    folder: Option<String>,

    /// Export CRS, e.g. EPSG:3413 (default: the ROI's CRS, then EPSG:4326)
    #[arg(long)]
    crs: Option<CrsCode>,

    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,

    /// Print the loaded seasons and imagery structure, then exit
    #[arg(long)]
    describe: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds between export status polls
    #[arg(long, default_value_t = 3)]
    poll_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(e) = run(&args).await {
        error!(category = failure_category(&e), error = %format!("{:#}", e), "Imagery export failed");
        return Err(e);
    }
    Ok(())
}

async fn run(args: &Args) -> Result<()> {
    info!(roi = %args.roi, "Starting imagery export");

    let registry = load_registry(&args.config)?;
    let catalog = InMemoryCatalog::from_json_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog snapshot from {:?}", args.catalog))?;
    let session = ImagerySession::new(&registry, &args.roi, Arc::new(catalog))?;

    if args.describe {
        println!("{}", session);
        return Ok(());
    }

    let request = build_request(args)?;
    let params = build_params(args)?;

    let plan = session.prepare_export(&request, &params).await?;
    println!("{}", plan);

    if !args.yes && !confirm("Proceed with export? [y/N] ")? {
        info!("Export cancelled by user");
        return Ok(());
    }

    let exporter = LocalExporter::new(&args.output_dir);
    let tasks = session.submit_export(&plan, &exporter).await?;

    let options = MonitorOptions {
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        ..Default::default()
    };
    let report = monitor_tasks(&tasks, options).await.into_result()?;

    info!(
        completed = report.completed,
        elapsed_secs = report.elapsed.as_secs_f64(),
        "All exports completed"
    );
    Ok(())
}

/// Error taxonomy category of a failure, for the exit log line.
fn failure_category(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<ImageryError>()
        .map(ImageryError::category)
        .unwrap_or("Error")
}

fn build_request(args: &Args) -> Result<ImageryRequest> {
    let collection = args
        .collection
        .clone()
        .context("--collection is required unless --describe is given")?;

    let mut request = ImageryRequest::new(collection)
        .path(split_underscored(args.keys.as_deref()))
        .bands(split_underscored(args.bands.as_deref()));

    if let Some(season) = &args.season {
        request = request.season(season);
    }
    if args.start_date.is_some() || args.end_date.is_some() {
        request = request.date_query(DateQuery {
            start: args.start_date.clone(),
            end: args.end_date.clone(),
            format: Some(CLI_DATE_FORMAT.to_string()),
        });
    }
    if let Some(window) = args.mosaic_window {
        request = request.mosaic(window);
    }
    Ok(request)
}

fn build_params(args: &Args) -> Result<ExportParams> {
    let dimensions = args
        .dimensions
        .as_deref()
        .map(parse_dimensions)
        .transpose()?;

    Ok(ExportParams {
        scale: args.resolution,
        crs_transform: None,
        dimensions,
        crs: args.crs,
        folder: args.folder.clone(),
    })
}

fn split_underscored(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split('_')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
