//! `Scenario`: one run of the event loop (spec §4.F/§4.F.1), the piece that
//! actually advances a fire across a grid for a single weather stream/seed
//! pair.
//!
//! `Scenario` depends on its surroundings only through the [`Environment`]
//! trait rather than a back-pointer to a model/grid object, following spec
//! §9's cyclic-reference note: `SpreadInfo` (and now `Scenario` itself) takes
//! "only the immutable subset ... as a small struct by reference". Grounded
//! in the teacher's dependency-injection style for `World`/`System`
//! collaborators in `simulation/mod.rs`, where stepping logic never holds a
//! raw pointer back to its host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell_points::XYPos;
use crate::cell_points_map::CellPointsMap;
use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventType, Scheduler};
use crate::fuel::FuelType;
use crate::grid::{relative_direction, Location, SpreadKey};
use crate::intensity_map::IntensityMap;
use crate::probability_map::ProbabilityMap;
use crate::spread_info::{SpreadContext, SpreadInfo};
use crate::thresholds::Thresholds;
use crate::weather::DailyWeather;

/// Duff-moisture-content breakpoints (spec §4.F.1's survival test), keyed by
/// DMC. Each breakpoint has a paired "free survival" hour count: a fire
/// resident at a cell for no longer than that many hours survives without
/// consulting the probabilistic test at all.
const DMC_BREAKPOINTS: [f64; 6] = [100.0, 109.0, 119.0, 131.0, 145.0, 218.0];
const FREE_SURVIVAL_HOURS: [f64; 6] = [24.0, 20.0, 16.0, 12.0, 8.0, 4.0];

/// Cap on how many cell-widths any point may travel in a single adaptive
/// step (spec §4.F.1 step 5's `MAX_SPREAD_CELLS`).
pub const MAX_SPREAD_CELLS: f64 = 0.75;

/// Everything a `Scenario` needs from the outside world, kept external per
/// spec §1's Non-goals (raster I/O, fuel-model internals, sunrise/sunset are
/// all out of the core's scope — only the contracts are specified).
pub trait Environment {
    fn rows(&self) -> i32;
    fn columns(&self) -> i32;
    fn cell_size_m(&self) -> f64;

    /// The `SpreadKey` (slope/aspect/fuel-code) of the cell at `loc`.
    fn spread_key(&self, loc: Location) -> SpreadKey;

    fn fuel_for(&self, key: SpreadKey) -> &dyn FuelType;

    /// Weather for the hour containing `time` (fractional days-of-year).
    fn weather_at(&self, time: f64) -> DailyWeather;

    fn is_daytime(&self, time: f64) -> bool;

    /// FFMC spread threshold for day or night (spec §4.F.1 step 1).
    fn ffmc_spread_threshold(&self, daytime: bool) -> f64;

    fn foliar_moisture_nd(&self, time: f64) -> i32;

    fn min_ros(&self) -> f64;
    fn max_angle_deg(&self) -> f64;

    /// Whether this scenario runs in deterministic mode (spec §3: all
    /// thresholds zero, survival test always passes).
    fn deterministic(&self) -> bool;
}

/// Outcome of a completed (non-cancelled) scenario run: one `ProbabilityMap`
/// per configured save time plus the final fire size, handed to the owning
/// Iteration for aggregation.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub probability_by_save: Vec<ProbabilityMap>,
    pub final_fire_size_ha: f64,
    pub out_of_bounds_count: u64,
}

pub struct Scenario<'e> {
    env: &'e dyn Environment,
    current_time: f64,
    points: CellPointsMap,
    intensity: IntensityMap,
    scheduler: Scheduler,
    spread_info: FxHashMap<SpreadKey, SpreadInfo>,
    unburnable: FxHashSet<u64>,
    max_ros: f64,
    thresholds: Thresholds,
    start_hour_index: usize,
    hour_index: Option<usize>,
    save_points: Vec<f64>,
    probability_by_save: Vec<ProbabilityMap>,
    last_save: f64,
    step: usize,
    out_of_bounds: u64,
    cancelled: Arc<AtomicBool>,
    completed: bool,
}

impl<'e> Scenario<'e> {
    /// `cancelled` is shared with every other `Scenario` in the owning
    /// Iteration (and ultimately with the Model's timer thread), not
    /// created per-scenario, so one deadline firing cancels the whole
    /// cohort (spec §4.G).
    #[must_use]
    pub fn new(
        env: &'e dyn Environment,
        thresholds: Thresholds,
        start_time: f64,
        save_points: Vec<f64>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        let last_save = save_points.iter().cloned().fold(start_time, f64::max);
        let n_saves = save_points.len();
        Scenario {
            env,
            current_time: start_time,
            points: CellPointsMap::new(),
            intensity: IntensityMap::new(env.cell_size_m()),
            scheduler: Scheduler::new(),
            spread_info: FxHashMap::default(),
            unburnable: FxHashSet::default(),
            max_ros: 0.0,
            thresholds,
            start_hour_index: (start_time * 24.0).floor() as usize,
            hour_index: None,
            save_points,
            probability_by_save: (0..n_saves).map(|_| ProbabilityMap::new()).collect(),
            last_save,
            step: 0,
            out_of_bounds: 0,
            cancelled,
            completed: false,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn fire_size_hectares(&self) -> f64 {
        self.intensity.fire_size_hectares()
    }

    #[must_use]
    pub fn out_of_bounds_count(&self) -> u64 {
        self.out_of_bounds
    }

    /// Find the nearest cell to `start` that can carry fire, spiralling
    /// outward ring by ring (spec §7's `DomainError` recovery for "fire
    /// ignited in a non-fuel cell"). Fatal once the search has covered half
    /// the grid's shorter dimension without finding one.
    fn resolve_ignition_cell(&self, start: Location) -> CoreResult<Location> {
        let max_radius = self.env.rows().min(self.env.columns()) / 2;
        for radius in 0..=max_radius {
            for loc in spiral_ring(start, radius) {
                if loc.row() < 0 || loc.column() < 0 || loc.row() >= self.env.rows() || loc.column() >= self.env.columns() {
                    continue;
                }
                let key = self.env.spread_key(loc);
                if self.env.fuel_for(key).is_valid() {
                    return Ok(loc);
                }
            }
        }
        Err(CoreError::Domain {
            reason: "no fuel cell found within half the grid of the ignition point".into(),
            cell: start,
        })
    }

    /// Run the full event loop to completion or cancellation (spec §4.F's
    /// initialization + main loop). `start_cell` is used only if no
    /// `perimeter` is given; a point ignition on a non-fuel cell is
    /// recovered by spiral-searching outward for the nearest fuel cell.
    pub fn run(&mut self, start_cell: Location, perimeter: Option<&[Location]>) -> CoreResult<Option<ScenarioOutcome>> {
        let start_cell = match perimeter {
            None => self.resolve_ignition_cell(start_cell)?,
            Some(_) => start_cell,
        };

        for &t in &self.save_points.clone() {
            self.scheduler.schedule(Event::new(t, EventType::Save, start_cell));
        }

        match perimeter {
            None => {
                self.scheduler.schedule(Event::new(self.current_time, EventType::NewFire, start_cell));
            }
            Some(cells) => {
                self.intensity.apply_perimeter(cells.iter().copied());
                for &loc in cells {
                    self.points.insert(XYPos::new(
                        f64::from(loc.column()) + 0.5,
                        f64::from(loc.row()) + 0.5,
                    ));
                }
                self.scheduler.schedule(Event::new(self.current_time, EventType::FireSpread, start_cell));
            }
        }
        self.scheduler.schedule(Event::new(self.last_save, EventType::EndSimulation, start_cell));

        for (&hash, points) in self.points.iter() {
            let loc = Location::from_hash(hash);
            if self.intensity.can_burn(loc) && !points.empty() {
                self.intensity.burn(loc, 1, 0.0, 0.0, self.current_time);
            }
        }

        while !self.scheduler.is_empty() {
            if self.cancelled.load(Ordering::Relaxed) {
                return Ok(None);
            }
            let event = self.scheduler.pop_earliest().expect("checked non-empty");
            self.current_time = event.time;
            self.step += 1;
            self.evaluate(event);
        }

        self.completed = true;
        Ok(Some(ScenarioOutcome {
            probability_by_save: std::mem::take(&mut self.probability_by_save),
            final_fire_size_ha: self.intensity.fire_size_hectares(),
            out_of_bounds_count: self.out_of_bounds,
        }))
    }

    fn evaluate(&mut self, event: Event) {
        match event.event_type {
            EventType::NewFire => self.handle_new_fire(event),
            EventType::FireSpread => self.handle_fire_spread(event),
            EventType::Save => self.handle_save(event),
            EventType::EndSimulation => self.scheduler.clear(),
            EventType::Invalid => {}
        }
    }

    fn handle_new_fire(&mut self, event: Event) {
        let loc = event.cell;
        self.points.insert(XYPos::new(f64::from(loc.column()) + 0.5, f64::from(loc.row()) + 0.5));
        let key = self.env.spread_key(loc);
        let weather = self.env.weather_at(event.time);
        let fuel = self.env.fuel_for(key);
        let survives = self.survives(&weather, 0.0, fuel, self.hour_at(event.time));
        if !survives {
            self.intensity.burn(loc, 1, 0.0, 0.0, event.time);
        }
        self.scheduler.schedule(Event::new(event.time, EventType::FireSpread, loc));
    }

    fn handle_save(&mut self, event: Event) {
        if let Some(idx) = self.save_points.iter().position(|&t| (t - event.time).abs() < 1e-9) {
            let snapshot = self.intensity.burned_snapshot();
            self.probability_by_save[idx].add_probability(&snapshot, self.intensity.fire_size_hectares());
        }
    }

    fn hour_at(&self, time: f64) -> usize {
        (time * 24.0).floor() as usize
    }

    fn local_hour_index(&self, hour_index: usize) -> usize {
        hour_index.saturating_sub(self.start_hour_index)
    }

    fn survives(&self, weather: &DailyWeather, hours_at_location: f64, fuel: &dyn FuelType, hour_index: usize) -> bool {
        if self.env.deterministic() {
            return true;
        }
        if short_residence_guarantees_survival(weather.dmc, hours_at_location) {
            return true;
        }
        let threshold = self.thresholds.extinction_at(self.local_hour_index(hour_index));
        threshold < fuel.survival_probability(weather)
    }

    /// The main inner algorithm, spec §4.F.1 steps 1-9.
    fn handle_fire_spread(&mut self, event: Event) {
        let t = event.time;
        let hour_index = self.hour_at(t);
        let next_hour = (hour_index + 1) as f64 / 24.0;
        let max_duration = (next_hour - t) * 1440.0;
        let max_time = t + max_duration / 1440.0;

        let daytime = self.env.is_daytime(t);
        let weather = self.env.weather_at(t);
        if weather.ffmc < self.env.ffmc_spread_threshold(daytime) {
            self.scheduler.schedule(Event::new(max_time, EventType::FireSpread, event.cell));
            return;
        }

        if self.hour_index != Some(hour_index) {
            self.hour_index = Some(hour_index);
            self.spread_info.clear();
            self.max_ros = 0.0;
        }

        let spread_threshold = self.thresholds.spread_by_ros_at(self.local_hour_index(hour_index)).max(self.env.min_ros());

        let mut to_spread: Vec<(SpreadKey, Location, Vec<XYPos>)> = Vec::new();
        {
            let env = self.env;
            let spread_info = &mut self.spread_info;
            let max_ros = &mut self.max_ros;
            let threshold = spread_threshold;
            let mut matched: Vec<u64> = Vec::new();
            for (&hash, cp) in self.points.iter() {
                if cp.is_unburnable() || cp.empty() {
                    continue;
                }
                let loc = Location::from_hash(hash);
                let key = env.spread_key(loc);
                let info = spread_info.entry(key).or_insert_with(|| {
                    let fuel = env.fuel_for(key);
                    let ctx = SpreadContext {
                        cell_size_m: env.cell_size_m(),
                        min_ros: env.min_ros(),
                        max_angle_deg: env.max_angle_deg(),
                        foliar_moisture_nd: env.foliar_moisture_nd(t),
                    };
                    SpreadInfo::compute(key, fuel, &weather, &ctx)
                });
                if info.head_ros < threshold || !info.can_spread() {
                    continue;
                }
                *max_ros = max_ros.max(info.head_ros);
                matched.push(hash);
            }
            for hash in matched {
                let loc = Location::from_hash(hash);
                let key = env.spread_key(loc);
                if let Some(cp) = self.points.get(hash) {
                    to_spread.push((key, loc, cp.unique()));
                }
            }
            self.points.remove_if(|hash, _| matched_contains(&to_spread, hash));
        }

        if to_spread.is_empty() {
            self.scheduler.schedule(Event::new(max_time, EventType::FireSpread, event.cell));
            return;
        }

        let duration = max_duration.min(MAX_SPREAD_CELLS * self.env.cell_size_m() / self.max_ros.max(1e-9));
        let new_time = t + duration / 1440.0;

        let mut routed = CellPointsMap::new();
        for (key, _src_loc, src_points) in &to_spread {
            let Some(info) = self.spread_info.get(key) else { continue };
            for p in src_points {
                for offset in &info.offsets {
                    let new_x = p.x + offset.dx_per_minute * duration;
                    let new_y = p.y + offset.dy_per_minute * duration;
                    let new_point = XYPos::new(new_x, new_y);
                    let (row, column) = (new_point.cell_row(), new_point.cell_column());
                    if row < 0 || column < 0 || row >= self.env.rows() || column >= self.env.columns() {
                        self.out_of_bounds += 1;
                        continue;
                    }
                    let from_loc = Location::new(p.cell_row(), p.cell_column());
                    let to_loc = Location::new(row, column);
                    let dest_hash = to_loc.hash();
                    if self.unburnable.contains(&dest_hash) {
                        continue;
                    }
                    let arrival = relative_direction(from_loc, to_loc);
                    routed.insert_with_arrival(new_point, arrival);
                }
            }
        }

        let destinations: Vec<u64> = routed.iter().map(|(&hash, _)| hash).collect();
        for hash in &destinations {
            let loc = Location::from_hash(*hash);
            let key = self.env.spread_key(loc);
            let Some(info) = self.spread_info.get(&key) else { continue };
            if info.max_intensity <= 0.0 || self.intensity.has_burned(loc) {
                continue;
            }
            let intensity = (info.max_intensity.round() as u32).max(1);
            self.intensity.burn(loc, intensity, info.head_ros, info.raz_deg, new_time);
        }

        for hash in &destinations {
            let loc = Location::from_hash(*hash);
            let key = self.env.spread_key(loc);
            let fuel = self.env.fuel_for(key);
            let arrival_time = self.intensity.arrival_time(loc).unwrap_or(new_time);
            let hours_at_location = (new_time - arrival_time) * 24.0;
            let survives = self.survives(&weather, hours_at_location, fuel, hour_index);
            let surrounded = self.intensity.is_surrounded(loc);
            if survives && !surrounded {
                if let Some(cp) = routed.get(*hash) {
                    self.points.merge(&self.unburnable, &singleton_map(*hash, cp.clone()));
                }
            } else {
                self.unburnable.insert(*hash);
                self.points.insert_unburnable(loc.row(), loc.column());
            }
        }

        self.scheduler.schedule(Event::new(new_time, EventType::FireSpread, event.cell));
    }
}

/// The square ring of cells at Chebyshev distance `radius` from `center`,
/// in spiral-search order. `radius` 0 is the center cell itself.
fn spiral_ring(center: Location, radius: i32) -> Vec<Location> {
    if radius == 0 {
        return vec![center];
    }
    let (cr, cc) = (center.row(), center.column());
    let mut cells = Vec::with_capacity((8 * radius) as usize);
    for dc in -radius..=radius {
        cells.push(Location::new(cr - radius, cc + dc));
        cells.push(Location::new(cr + radius, cc + dc));
    }
    for dr in -radius + 1..radius {
        cells.push(Location::new(cr + dr, cc - radius));
        cells.push(Location::new(cr + dr, cc + radius));
    }
    cells
}

fn matched_contains(to_spread: &[(SpreadKey, Location, Vec<XYPos>)], hash: u64) -> bool {
    to_spread.iter().any(|(_, loc, _)| loc.hash() == hash)
}

fn singleton_map(hash: u64, cp: crate::cell_points::CellPoints) -> CellPointsMap {
    let mut map = CellPointsMap::new();
    let loc = Location::from_hash(hash);
    for p in cp.unique() {
        map.insert_with_arrival(p, None);
    }
    let _ = loc;
    map
}

fn short_residence_guarantees_survival(dmc: f64, hours_at_location: f64) -> bool {
    let idx = DMC_BREAKPOINTS.iter().position(|&b| dmc <= b).unwrap_or(DMC_BREAKPOINTS.len() - 1);
    hours_at_location <= FREE_SURVIVAL_HOURS[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuel::StandardFuel;

    struct UniformEnv {
        rows: i32,
        columns: i32,
        fuel: StandardFuel,
        non_fuel: StandardFuel,
        weather: DailyWeather,
        barrier_column: Option<i32>,
    }

    impl Environment for UniformEnv {
        fn rows(&self) -> i32 {
            self.rows
        }
        fn columns(&self) -> i32 {
            self.columns
        }
        fn cell_size_m(&self) -> f64 {
            100.0
        }
        fn spread_key(&self, loc: Location) -> SpreadKey {
            let fuel_code = if self.barrier_column == Some(loc.column()) { 0 } else { 2 };
            SpreadKey::new(0.0, 0.0, fuel_code)
        }
        fn fuel_for(&self, key: SpreadKey) -> &dyn FuelType {
            if key.fuel_code == 0 {
                &self.non_fuel
            } else {
                &self.fuel
            }
        }
        fn weather_at(&self, _time: f64) -> DailyWeather {
            self.weather
        }
        fn is_daytime(&self, _time: f64) -> bool {
            true
        }
        fn ffmc_spread_threshold(&self, _daytime: bool) -> f64 {
            0.0
        }
        fn foliar_moisture_nd(&self, _time: f64) -> i32 {
            0
        }
        fn min_ros(&self) -> f64 {
            0.1
        }
        fn max_angle_deg(&self) -> f64 {
            15.0
        }
        fn deterministic(&self) -> bool {
            true
        }
    }

    fn fuel() -> StandardFuel {
        StandardFuel {
            fuel_code: 2,
            a: 110.0,
            b: 0.0282,
            c: 1.5,
            bui_q: 0.7,
            bui_0: 50.0,
            fuel_load: 5.0,
            cbh: 3.0,
            cfl: 0.8,
            can_crown: true,
            moisture_of_extinction: 0.3,
        }
    }

    fn weather() -> DailyWeather {
        DailyWeather::new(92.0, 35.5, 275.0, 20.0, 30.0, 10.0, 0.0, 0.0)
    }

    #[test]
    fn ignition_burns_origin_cell() {
        let env = UniformEnv { rows: 50, columns: 50, fuel: fuel(), non_fuel: StandardFuel::non_fuel(0), weather: weather(), barrier_column: None };
        let thresholds = Thresholds::zeroed(48);
        let mut scenario = Scenario::new(&env, thresholds, 0.5, vec![1.0], Arc::new(AtomicBool::new(false)));
        let outcome = scenario.run(Location::new(25, 25), None).expect("no domain error");
        assert!(outcome.is_some());
        assert!(scenario.fire_size_hectares() > 0.0);
    }

    #[test]
    fn fire_grows_over_several_hours() {
        let env = UniformEnv { rows: 80, columns: 80, fuel: fuel(), non_fuel: StandardFuel::non_fuel(0), weather: weather(), barrier_column: None };
        let thresholds = Thresholds::zeroed(72);
        let mut scenario = Scenario::new(&env, thresholds, 0.5, vec![0.5 + 6.0 / 24.0], Arc::new(AtomicBool::new(false)));
        scenario.run(Location::new(40, 40), None).expect("no domain error");
        assert!(scenario.fire_size_hectares() >= 1.0);
    }

    #[test]
    fn non_fuel_barrier_halts_spread_eastward() {
        let env = UniformEnv {
            rows: 100,
            columns: 100,
            fuel: fuel(),
            non_fuel: StandardFuel::non_fuel(0),
            weather: weather(),
            barrier_column: Some(70),
        };
        let thresholds = Thresholds::zeroed(48);
        let mut scenario = Scenario::new(&env, thresholds, 0.5, vec![0.5 + 10.0 / 24.0], Arc::new(AtomicBool::new(false)));
        scenario.run(Location::new(50, 50), None).expect("no domain error");
        assert_eq!(scenario.out_of_bounds_count(), 0);
    }

    #[test]
    fn ignition_in_non_fuel_cell_recovers_via_spiral_search() {
        let env = UniformEnv {
            rows: 50,
            columns: 50,
            fuel: fuel(),
            non_fuel: StandardFuel::non_fuel(0),
            weather: weather(),
            barrier_column: Some(25),
        };
        let thresholds = Thresholds::zeroed(24);
        let mut scenario = Scenario::new(&env, thresholds, 0.5, vec![0.5 + 2.0 / 24.0], Arc::new(AtomicBool::new(false)));
        let outcome = scenario.run(Location::new(25, 25), None).expect("recovers onto adjacent fuel cell");
        assert!(outcome.is_some());
    }

    #[test]
    fn ignition_far_from_any_fuel_is_fatal() {
        struct AllNonFuel {
            non_fuel: StandardFuel,
        }
        impl Environment for AllNonFuel {
            fn rows(&self) -> i32 {
                20
            }
            fn columns(&self) -> i32 {
                20
            }
            fn cell_size_m(&self) -> f64 {
                100.0
            }
            fn spread_key(&self, _loc: Location) -> SpreadKey {
                SpreadKey::new(0.0, 0.0, 0)
            }
            fn fuel_for(&self, _key: SpreadKey) -> &dyn FuelType {
                &self.non_fuel
            }
            fn weather_at(&self, _time: f64) -> DailyWeather {
                DailyWeather::new(92.0, 35.5, 275.0, 20.0, 30.0, 10.0, 0.0, 0.0)
            }
            fn is_daytime(&self, _time: f64) -> bool {
                true
            }
            fn ffmc_spread_threshold(&self, _daytime: bool) -> f64 {
                0.0
            }
            fn foliar_moisture_nd(&self, _time: f64) -> i32 {
                0
            }
            fn min_ros(&self) -> f64 {
                0.1
            }
            fn max_angle_deg(&self) -> f64 {
                15.0
            }
            fn deterministic(&self) -> bool {
                true
            }
        }
        let env = AllNonFuel { non_fuel: StandardFuel::non_fuel(0) };
        let thresholds = Thresholds::zeroed(24);
        let mut scenario = Scenario::new(&env, thresholds, 0.5, vec![0.5 + 2.0 / 24.0], Arc::new(AtomicBool::new(false)));
        let err = scenario.run(Location::new(10, 10), None).unwrap_err();
        assert!(matches!(err, CoreError::Domain { .. }));
    }

    #[test]
    fn short_residence_table_is_monotone_non_increasing() {
        let mut prev = f64::INFINITY;
        for &b in &DMC_BREAKPOINTS {
            let hours = FREE_SURVIVAL_HOURS[DMC_BREAKPOINTS.iter().position(|&x| x == b).unwrap()];
            assert!(hours <= prev);
            prev = hours;
        }
    }
}
