//! Event-driven probabilistic wildland fire growth simulation engine.
//!
//! The core owns the spatial representation (`grid`, `cell_points`,
//! `cell_points_map`), the per-scenario event loop (`event`, `scenario`), the
//! elliptical fire-growth computation (`spread_info`) and its fuel/weather
//! collaborator contracts (`fuel`, `weather`), and the statistical
//! aggregation layer (`probability_map`, `iteration`, `model`). Raster I/O,
//! CLI parsing, and concrete fuel-model data all live outside this crate.

pub mod cell_points;
pub mod cell_points_map;
pub mod error;
pub mod event;
pub mod fuel;
pub mod grid;
pub mod intensity_map;
pub mod iteration;
pub mod model;
pub mod probability_map;
pub mod scenario;
pub mod spread_info;
pub mod thresholds;
pub mod weather;

pub use cell_points::{CellPoints, XYPos};
pub use cell_points_map::CellPointsMap;
pub use error::{CoreError, CoreResult};
pub use event::{Event, EventType, Scheduler};
pub use fuel::{FuelTableRow, FuelType, StandardFuel};
pub use grid::{Cell, CellIndex, Direction16, Location, SpreadKey};
pub use intensity_map::IntensityMap;
pub use iteration::{Iteration, IterationOutcome, ScenarioSpec};
pub use model::{thresholds_for_scenario, GlobalProbability, Model, ModelStatistics, StopReason, StopRule};
pub use probability_map::{IntensityBin, ProbabilityMap};
pub use scenario::{Environment, Scenario, ScenarioOutcome, MAX_SPREAD_CELLS};
pub use spread_info::{fire_intensity, Offset, SpreadContext, SpreadInfo};
pub use thresholds::{hour_count, Thresholds};
pub use weather::{DailyWeather, FwiWeather, WeatherStream};
