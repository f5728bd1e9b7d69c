//! Command-line driver for the wildland fire growth probability engine
//! (spec §6): loads landscape rasters, a fuel lookup table, and a
//! multi-scenario weather file, then runs either a single deterministic
//! test scenario or the full probabilistic `Model` loop and writes
//! probability/intensity/occurrence rasters plus per-save fire-size CSVs.

mod environment;
mod error;
mod fuel_models;
mod fwi;
mod raster;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use rustc_hash::FxHashMap;
use tracing::{info, warn};

use firegrowth_core::{
    hour_count, thresholds_for_scenario, Iteration, Location, Model, ProbabilityMap, Scenario, ScenarioSpec,
    StopReason, StopRule, Thresholds, WeatherStream,
};

use crate::environment::RasterEnvironment;
use crate::error::{CliError, CliResult};
use crate::fuel_models::standard_fuel_for;
use crate::raster::{output_path, probability_to_u8, write_gray_u8, RasterGrid};

/// Whether this run validates setup with one deterministic scenario
/// (`test`) or runs the full probabilistic simulation (`surface`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Surface,
    Test,
}

#[derive(Parser, Debug)]
#[command(name = "firegrowth")]
#[command(about = "Wildland fire growth probability simulation", long_about = None)]
struct Args {
    /// Directory output rasters and CSVs are written into.
    output_dir: PathBuf,
    /// Ignition date, YYYY-MM-DD.
    #[arg(value_parser = parse_date)]
    date: NaiveDate,
    /// Ignition latitude, decimal degrees.
    lat: f64,
    /// Ignition longitude, decimal degrees.
    lon: f64,
    /// Ignition clock time, HH:MM (local).
    #[arg(value_parser = parse_hhmm)]
    start_hour: f64,
    /// `surface` runs the full probabilistic model; `test` runs one
    /// deterministic scenario to validate setup.
    #[arg(value_enum)]
    mode: Mode,

    /// Weather CSV: `Scenario,Date,PREC,TEMP,RH,WS,WD`.
    #[arg(long)]
    wx: PathBuf,
    /// Seed Fine Fuel Moisture Code at the day before the weather file starts.
    #[arg(long)]
    ffmc: f64,
    /// Seed Duff Moisture Code.
    #[arg(long)]
    dmc: f64,
    /// Seed Drought Code.
    #[arg(long)]
    dc: f64,
    /// UTC offset in hours, e.g. `-5` for US Eastern.
    #[arg(long)]
    tz: f64,

    /// Ignition perimeter (row,column pairs), one per line. Omit for a
    /// point ignition at `lat,lon`.
    #[arg(long)]
    perim: Option<PathBuf>,
    /// Point-ignition fire size in hectares, used to synthesize a small
    /// circular starting perimeter when `--perim` is not given.
    #[arg(long)]
    size: Option<f64>,
    /// Precipitation (mm) on the day before the weather file starts, folded
    /// into the first day's FWI carry-forward.
    #[arg(long, default_value_t = 0.0)]
    apcp_prev: f64,
    /// Run every scenario with all-zero thresholds (no stochastic
    /// suppression or survival failure).
    #[arg(long)]
    deterministic: bool,
    /// Confidence level the stop rule targets, in `(0, 1)`.
    #[arg(long, default_value_t = 0.95)]
    confidence: f64,
    /// Skip writing the per-bin intensity rasters.
    #[arg(long = "no-intensity")]
    no_intensity: bool,
    /// Skip writing the probability raster.
    #[arg(long = "no-probability")]
    no_probability: bool,
    /// Also write a raw-occurrence-count raster per save point.
    #[arg(long)]
    occurrence: bool,
    /// Also write a binary simulated-extent raster per save point.
    #[arg(long = "sim-area")]
    sim_area: bool,
    /// Comma-separated days-from-ignition to save output at, e.g. `1,3,7`.
    #[arg(long = "output_date_offsets", default_value = "1")]
    output_date_offsets: String,
    /// Directory containing `fuel.tif`, `slope.tif`, `aspect.tif`.
    #[arg(long = "raster-root", default_value = ".")]
    raster_root: PathBuf,
    /// Fuel lookup table CSV: `grid_value,export_value,descriptive_name,fuel_type`.
    #[arg(long = "fuel-lut")]
    fuel_lut: PathBuf,
    /// Run the model loop on the calling thread instead of spawning a
    /// deadline-watching timer thread.
    #[arg(short = 's')]
    synchronous: bool,
    /// Wall-clock deadline for the model loop, in seconds. Omit for no
    /// deadline (the iteration-count/confidence stop rule still applies).
    #[arg(long = "max-runtime-seconds")]
    max_runtime_seconds: Option<u64>,
    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
    /// Decrease log verbosity (repeatable).
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    quiet: u8,
    /// Also write full-detail (TRACE level) logs to this file.
    #[arg(long)]
    log: Option<PathBuf>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date {s:?}: {e}"))
}

fn parse_hhmm(s: &str) -> Result<f64, String> {
    let (h, m) = s.split_once(':').ok_or_else(|| format!("expected HH:MM, got {s:?}"))?;
    let hours: f64 = h.parse().map_err(|_| format!("invalid hour in {s:?}"))?;
    let minutes: f64 = m.parse().map_err(|_| format!("invalid minute in {s:?}"))?;
    Ok(hours + minutes / 60.0)
}

/// Sets up the stderr subscriber at the verbosity the `-v`/`-q` counters
/// select, plus (spec §7) an always-TRACE file sink when `--log` is given.
fn init_logging(verbose: u8, quiet: u8, log_file: Option<&Path>) -> CliResult<()> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = match i16::from(verbose) - i16::from(quiet) {
        v if v <= -2 => tracing::Level::ERROR,
        -1 => tracing::Level::WARN,
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let stderr_layer = tracing_subscriber::fmt::layer().with_target(false).with_filter(LevelFilter::from_level(level));
    let registry = tracing_subscriber::registry().with(stderr_layer);

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
            let file_layer =
                tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false).with_target(false).with_filter(LevelFilter::TRACE);
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
    Ok(())
}

fn load_fuel_lut(path: &Path) -> CliResult<(FxHashMap<u8, u16>, FxHashMap<u16, firegrowth_core::StandardFuel>)> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|source| CliError::Csv { path: path.to_path_buf(), source })?;
    let mut grid_to_code = FxHashMap::default();
    let mut fuel_by_code = FxHashMap::default();
    for record in reader.records() {
        let record = record.map_err(|source| CliError::Csv { path: path.to_path_buf(), source })?;
        let grid_value: u8 =
            record.get(0).and_then(|v| v.parse().ok()).ok_or_else(|| CliError::Usage("bad grid_value".into()))?;
        let export_value: u16 =
            record.get(1).and_then(|v| v.parse().ok()).ok_or_else(|| CliError::Usage("bad export_value".into()))?;
        let fuel_type = record.get(3).unwrap_or("").to_string();
        let fuel = standard_fuel_for(&fuel_type, export_value)?;
        grid_to_code.insert(grid_value, export_value);
        fuel_by_code.insert(export_value, fuel);
    }
    Ok((grid_to_code, fuel_by_code))
}

/// Parse the weather CSV into one `WeatherStream` per `Scenario` column,
/// recomputing FFMC/DMC/DC day by day from the command-line seed indices
/// (spec §1 keeps FWI derivation out of `firegrowth_core`).
fn load_weather_streams(
    path: &Path,
    ffmc0: f64,
    dmc0: f64,
    dc0: f64,
    apcp_prev: f64,
) -> CliResult<Vec<WeatherStream>> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|source| CliError::Csv { path: path.to_path_buf(), source })?;

    struct Carry {
        ffmc: f64,
        dmc: f64,
        dc: f64,
        stream: WeatherStream,
        first: bool,
    }
    let mut by_scenario: FxHashMap<u32, Carry> = FxHashMap::default();
    let mut order: Vec<u32> = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|source| CliError::Csv { path: path.to_path_buf(), source })?;
        let scenario: u32 =
            record.get(0).and_then(|v| v.parse().ok()).ok_or_else(|| CliError::Weather("bad Scenario".into()))?;
        let date = NaiveDate::parse_from_str(record.get(1).unwrap_or(""), "%Y-%m-%d")
            .map_err(|e| CliError::Weather(format!("bad Date: {e}")))?;
        let precip: f64 =
            record.get(2).and_then(|v| v.parse().ok()).ok_or_else(|| CliError::Weather("bad PREC".into()))?;
        let temp: f64 =
            record.get(3).and_then(|v| v.parse().ok()).ok_or_else(|| CliError::Weather("bad TEMP".into()))?;
        let rh: f64 =
            record.get(4).and_then(|v| v.parse().ok()).ok_or_else(|| CliError::Weather("bad RH".into()))?;
        let ws: f64 =
            record.get(5).and_then(|v| v.parse().ok()).ok_or_else(|| CliError::Weather("bad WS".into()))?;
        let wd: f64 = record.get(6).and_then(|v| v.parse().ok()).unwrap_or(0.0);

        let carry = by_scenario.entry(scenario).or_insert_with(|| {
            order.push(scenario);
            Carry { ffmc: ffmc0, dmc: dmc0, dc: dc0, stream: WeatherStream::new(scenario), first: true }
        });

        let effective_precip = if carry.first { precip + apcp_prev } else { precip };
        carry.ffmc = fwi::update_ffmc(carry.ffmc, temp, rh, ws, effective_precip);
        carry.dmc = fwi::update_dmc(carry.dmc, temp, rh, effective_precip);
        carry.dc = fwi::update_dc(carry.dc, temp, effective_precip);
        carry.first = false;

        let weather = firegrowth_core::DailyWeather::new(carry.ffmc, carry.dmc, carry.dc, temp, rh, ws, wd, precip);
        carry
            .stream
            .push_day(date, weather)
            .map_err(CliError::Weather)?;
    }

    Ok(order.into_iter().filter_map(|id| by_scenario.remove(&id)).map(|c| c.stream).collect())
}

fn parse_offsets(s: &str) -> CliResult<Vec<i64>> {
    s.split(',')
        .map(|tok| tok.trim().parse::<i64>().map_err(|_| CliError::Usage(format!("bad output_date_offsets: {tok:?}"))))
        .collect()
}

/// Parse a `row,column` perimeter file, one location per line.
fn load_perimeter(path: &Path) -> CliResult<Vec<Location>> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let (r, c) = line
                .split_once(',')
                .ok_or_else(|| CliError::Usage(format!("bad perimeter line {line:?}")))?;
            let row: i32 = r.trim().parse().map_err(|_| CliError::Usage(format!("bad row in {line:?}")))?;
            let column: i32 = c.trim().parse().map_err(|_| CliError::Usage(format!("bad column in {line:?}")))?;
            Ok(Location::new(row, column))
        })
        .collect()
}

/// Synthesize a roughly-circular starting perimeter of the requested size
/// around `center`, used when `--size` is given instead of `--perim`.
fn synth_perimeter(center: Location, hectares: f64, cell_size_m: f64) -> Vec<Location> {
    let area_m2 = hectares * 10_000.0;
    let radius_cells = ((area_m2 / std::f64::consts::PI).sqrt() / cell_size_m).round().max(1.0) as i32;
    let mut points = Vec::new();
    for dr in -radius_cells..=radius_cells {
        for dc in -radius_cells..=radius_cells {
            if dr * dr + dc * dc <= radius_cells * radius_cells {
                let row = center.row() + dr;
                let column = center.column() + dc;
                if row >= 0 && column >= 0 {
                    points.push(Location::new(row, column));
                }
            }
        }
    }
    points
}

fn build_environment(
    fuel_raster: &RasterGrid,
    slope_raster: &Option<RasterGrid>,
    aspect_raster: &Option<RasterGrid>,
    grid_to_code: &FxHashMap<u8, u16>,
    fuel_by_code: &FxHashMap<u16, firegrowth_core::StandardFuel>,
    weather: WeatherStream,
    start_date: NaiveDate,
    lat: f64,
    lon: f64,
    tz: f64,
    deterministic: bool,
) -> RasterEnvironment {
    RasterEnvironment::new(
        fuel_raster.clone(),
        slope_raster.clone(),
        aspect_raster.clone(),
        100.0,
        fuel_by_code.clone(),
        grid_to_code.clone(),
        weather,
        start_date,
        lat,
        lon,
        tz,
        deterministic,
    )
}

/// Deletes any `interim_*` files left behind by a prior run that hit its
/// deadline before an Iteration finished (spec §5: "these are deleted on
/// the next clean run").
fn sweep_interim_files(output_dir: &Path) -> CliResult<()> {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(CliError::Io { path: output_dir.to_path_buf(), source }),
    };
    for entry in entries {
        let entry = entry.map_err(|source| CliError::Io { path: output_dir.to_path_buf(), source })?;
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with("interim_") {
            std::fs::remove_file(&path).map_err(|source| CliError::Io { path, source })?;
        }
    }
    Ok(())
}

fn run(args: Args) -> CliResult<()> {
    std::fs::create_dir_all(&args.output_dir)
        .map_err(|source| CliError::Io { path: args.output_dir.clone(), source })?;
    sweep_interim_files(&args.output_dir)?;

    let fuel_raster = RasterGrid::read(&args.raster_root.join("fuel.tif"))?;
    let slope_raster = RasterGrid::read(&args.raster_root.join("slope.tif")).ok();
    let aspect_raster = RasterGrid::read(&args.raster_root.join("aspect.tif")).ok();
    let (grid_to_code, fuel_by_code) = load_fuel_lut(&args.fuel_lut)?;

    let streams = load_weather_streams(&args.wx, args.ffmc, args.dmc, args.dc, args.apcp_prev)?;
    if streams.is_empty() {
        return Err(CliError::Weather("weather file contains no scenarios".into()));
    }

    let last_date =
        streams.iter().filter_map(WeatherStream::last_date).max().ok_or_else(|| CliError::Weather("empty weather stream".into()))?;
    if !streams.iter().all(|s| s.covers(args.date, last_date)) {
        warn!("not every scenario's weather covers the full save horizon");
    }

    let offsets = parse_offsets(&args.output_date_offsets)?;
    let start_time = args.start_hour / 24.0;
    let save_points: Vec<f64> = offsets.iter().map(|&d| start_time + d as f64).collect();
    let hours = hour_count(args.date, last_date);

    let start_cell = Location::new((fuel_raster.rows / 2).max(0), (fuel_raster.columns / 2).max(0));
    let perimeter = match (&args.perim, args.size) {
        (Some(path), _) => Some(load_perimeter(path)?),
        (None, Some(hectares)) => Some(synth_perimeter(start_cell, hectares, 100.0)),
        (None, None) => None,
    };
    let rows = fuel_raster.rows;
    let columns = fuel_raster.columns;

    let environments: Vec<RasterEnvironment> = streams
        .into_iter()
        .map(|w| {
            build_environment(
                &fuel_raster,
                &slope_raster,
                &aspect_raster,
                &grid_to_code,
                &fuel_by_code,
                w,
                args.date,
                args.lat,
                args.lon,
                args.tz,
                args.deterministic || args.mode == Mode::Test,
            )
        })
        .collect();

    info!(scenarios = environments.len(), saves = save_points.len(), "starting run");

    if args.mode == Mode::Test {
        let env = &environments[0];
        let cancelled = Arc::new(AtomicBool::new(false));
        let thresholds = Thresholds::zeroed(hours);
        let mut scenario = Scenario::new(env, thresholds, start_time, save_points.clone(), cancelled);
        let outcome = scenario
            .run(start_cell, perimeter.as_deref())?
            .ok_or_else(|| CliError::Usage("test scenario cancelled".into()))?;
        info!(final_size_ha = outcome.final_fire_size_ha, out_of_bounds = outcome.out_of_bounds_count, "test run complete");
        return write_outputs(&args, &outcome.probability_by_save, &offsets, rows, columns, false);
    }

    let max_iterations = if args.synchronous { 1 } else { 200 };
    let max_runtime = args.max_runtime_seconds.map(std::time::Duration::from_secs);
    let rule = StopRule { confidence_level: args.confidence, max_runtime, max_iterations: Some(max_iterations) };
    let mut model = Model::new(rule, save_points.len());
    let reason = model.run(|n| {
        let specs: Vec<ScenarioSpec<'_>> = environments
            .iter()
            .enumerate()
            .map(|(idx, env)| ScenarioSpec {
                env,
                thresholds: thresholds_for_scenario(hours, seed_for(n, idx), env.deterministic()),
            })
            .collect();
        (Iteration::new(start_cell, start_time, save_points.clone(), perimeter.clone()), specs)
    })?;
    let iterations = model.statistics().iterations_recorded();
    info!(?reason, iterations, "model loop finished");

    let interim = reason == StopReason::Deadline && iterations == 0;
    write_outputs(&args, &model.global_probability().snapshot(), &offsets, rows, columns, interim)
}

fn seed_for(iteration: u32, scenario_idx: usize) -> u64 {
    (u64::from(iteration) << 32) ^ (scenario_idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn write_outputs(
    args: &Args,
    maps: &[ProbabilityMap],
    offsets: &[i64],
    rows: i32,
    columns: i32,
    interim: bool,
) -> CliResult<()> {
    for (pm, &offset) in maps.iter().zip(offsets) {
        let date = args.date + chrono::Duration::days(offset);
        write_probability_map(args, pm, offset, date, rows, columns, interim)?;
    }
    Ok(())
}

fn write_probability_map(
    args: &Args,
    pm: &ProbabilityMap,
    offset: i64,
    date: NaiveDate,
    rows: i32,
    columns: i32,
    interim: bool,
) -> CliResult<()> {
    if !args.no_probability {
        let data = probability_to_u8(rows, columns, |r, c| pm.probability(Location::new(r, c).hash()));
        write_gray_u8(&output_path(&args.output_dir, "probability", interim, offset, date), rows, columns, &data)?;
    }

    if args.occurrence {
        let scenarios = pm.scenarios_added().max(1);
        let data = probability_to_u8(rows, columns, |r, c| {
            f64::from(pm.total_count(Location::new(r, c).hash())) / f64::from(scenarios)
        });
        write_gray_u8(&output_path(&args.output_dir, "occurrence", interim, offset, date), rows, columns, &data)?;
    }

    if !args.no_intensity {
        use firegrowth_core::IntensityBin;
        for (name, bin) in
            [("intensity_L", IntensityBin::Low), ("intensity_M", IntensityBin::Moderate), ("intensity_H", IntensityBin::High)]
        {
            let scenarios = pm.scenarios_added().max(1);
            let data = probability_to_u8(rows, columns, |r, c| {
                f64::from(pm.bin_count(Location::new(r, c).hash(), bin)) / f64::from(scenarios)
            });
            write_gray_u8(&output_path(&args.output_dir, name, interim, offset, date), rows, columns, &data)?;
        }
    }

    if args.sim_area {
        let data = probability_to_u8(rows, columns, |r, c| if pm.total_count(Location::new(r, c).hash()) > 0 { 1.0 } else { 0.0 });
        write_gray_u8(&output_path(&args.output_dir, "sim_area", interim, offset, date), rows, columns, &data)?;
    }

    let tag = if interim { "interim_" } else { "" };
    let sizes_path = args.output_dir.join(format!("{tag}sizes_{offset:03}_{date}.csv"));
    let mut writer =
        csv::Writer::from_path(&sizes_path).map_err(|source| CliError::Csv { path: sizes_path.clone(), source })?;
    writer.write_record(["fire_size_ha"]).map_err(|source| CliError::Csv { path: sizes_path.clone(), source })?;
    for size in pm.fire_sizes_ha() {
        writer
            .write_record([size.to_string()])
            .map_err(|source| CliError::Csv { path: sizes_path.clone(), source })?;
    }
    writer.flush().map_err(|e| CliError::Io { path: sizes_path.clone(), source: e })?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(args.verbose, args.quiet, args.log.as_deref()) {
        eprintln!("FATAL: {e}");
        return ExitCode::FAILURE;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("FATAL: {e}");
            ExitCode::FAILURE
        }
    }
}
