//! `demflood`: read DEM cells from a remote GeoTIFF and report river flooding.

use clap::{ArgGroup, Parser};
use demflood_dem::{
    FileTransport, GeoBounds, GeoTiffSource, HttpTransport, ProgressMonitor, RasterSource, Transport,
    TransportWithProgress,
};
use demflood_runner::{
    parse_bounds, parse_lat_lon, CellGrid, DemfloodConfig, Result, SampleReport, SelectionOutcome,
    SelectionReport, SelectionSession, SessionReport,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Inspect elevation of map cells and simulate flooding from river channels.
#[derive(Parser, Debug)]
#[command(name = "demflood")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("selection").required(true).multiple(true).args(["points", "bounds"])))]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GeoTIFF URL or local path (overrides the config)
    #[arg(long)]
    url: Option<String>,

    /// Select the grid cell containing LAT,LON (repeatable)
    #[arg(short, long = "point", value_name = "LAT,LON", allow_hyphen_values = true)]
    points: Vec<String>,

    /// Select explicit bounds SOUTH,WEST,NORTH,EAST (repeatable)
    #[arg(short, long = "bounds", value_name = "S,W,N,E", allow_hyphen_values = true)]
    bounds: Vec<String>,

    /// Keep every selected cell instead of replacing the previous one
    #[arg(short, long)]
    multi: bool,

    /// Water level in metres
    #[arg(long, allow_hyphen_values = true)]
    water_level: Option<f64>,

    /// Base river level in metres
    #[arg(long, allow_hyphen_values = true)]
    base_level: Option<f64>,

    /// Minimum cells of a connected low area to count as a river
    #[arg(long)]
    min_seed_cells: Option<f64>,

    /// Display ceiling override in metres, applied after the selections
    #[arg(long, allow_hyphen_values = true)]
    max_override: Option<f64>,

    /// Sample the elevation at LAT,LON of the last tile (repeatable)
    #[arg(long = "sample", value_name = "LAT,LON", allow_hyphen_values = true)]
    samples: Vec<String>,

    /// Upper bound on rows per window chunk
    #[arg(long)]
    max_chunk_rows: Option<u32>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Do not print download progress
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init();

    let cli = Cli::parse();
    demflood_metrics::describe_metrics();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<DemfloodConfig> {
    let mut config = match &cli.config {
        Some(path) => DemfloodConfig::load(path)?,
        None => DemfloodConfig::default(),
    };

    if let Some(url) = &cli.url {
        config.source.url = url.clone();
    }
    if let Some(rows) = cli.max_chunk_rows {
        config.source.max_chunk_rows = rows;
    }
    if let Some(level) = cli.base_level {
        config.flood.base_level = level;
    }
    if let Some(level) = cli.water_level {
        config.flood.water_level = Some(level);
    }
    if let Some(cells) = cli.min_seed_cells {
        config.flood.min_seed_cells = cells;
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let grid = CellGrid::from_config(&config.grid);

    let mut selections = Vec::new();
    for point in &cli.points {
        let (lat, lon) = parse_lat_lon(point)?;
        let (lat, lon) = grid.clamp_point(lat, lon);
        selections.push(grid.cell_at(lat, lon));
    }
    for bounds in &cli.bounds {
        selections.push(parse_bounds(bounds)?);
    }
    let samples = cli
        .samples
        .iter()
        .map(|s| parse_lat_lon(s))
        .collect::<Result<Vec<_>>>()?;

    let monitor = Arc::new(ProgressMonitor::new());
    info!("Reading {}", config.source.url);
    if config.source.is_remote() {
        let transport = HttpTransport::new(config.source.request_timeout())?;
        execute(&cli, &config, transport, monitor, &selections, &samples).await
    } else {
        execute(&cli, &config, FileTransport, monitor, &selections, &samples).await
    }
}

async fn execute<T: Transport>(
    cli: &Cli,
    config: &DemfloodConfig,
    transport: T,
    monitor: Arc<ProgressMonitor>,
    selections: &[GeoBounds],
    samples: &[(f64, f64)],
) -> Result<()> {
    let url = config.source.url.clone();
    let transport = TransportWithProgress::new(transport, url.clone(), Arc::clone(&monitor));
    let source = GeoTiffSource::with_block_size(url.clone(), transport, config.source.block_size)
        .with_cache_blocks(config.source.cache_blocks);
    let session = SelectionSession::new(source, monitor)
        .with_max_chunk_rows(config.source.max_chunk_rows)
        .with_params(config.flood.params());
    if cli.multi {
        session.set_multi_select(true);
    }

    let mut reports = Vec::with_capacity(selections.len());
    for &bounds in selections {
        let outcome = select_with_progress(&session, bounds, !cli.quiet).await;
        reports.push(SelectionReport::record(&session, bounds, &outcome));
    }

    if let Some(value) = cli.max_override {
        session.set_display_override(value);
    }

    let samples = samples
        .iter()
        .map(|&(lat, lon)| SampleReport {
            lat,
            lon,
            elevation: session.sample(lat, lon),
        })
        .collect();

    let report = SessionReport::new(url, &session, reports, samples);
    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

/// Run a selection, drawing its progress on stderr.
async fn select_with_progress<S: RasterSource>(
    session: &SelectionSession<S>,
    bounds: GeoBounds,
    show: bool,
) -> SelectionOutcome {
    let mut progress = session.progress().subscribe();
    let selection = session.select(bounds);
    tokio::pin!(selection);

    let mut drawn = false;
    loop {
        tokio::select! {
            outcome = &mut selection => {
                if drawn {
                    eprintln!();
                }
                return outcome;
            }
            Ok(()) = progress.changed(), if show => {
                let state = *progress.borrow_and_update();
                if state.active {
                    eprint!("\rDownloading DEM… {:>3}%", state.percent);
                    let _ = std::io::stderr().flush();
                    drawn = true;
                }
            }
        }
    }
}
