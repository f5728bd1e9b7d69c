//! `RasterEnvironment`: the concrete `firegrowth_core::Environment` the CLI
//! builds from decoded GeoTIFF inputs, a fuel lookup table, and one
//! scenario's weather stream. This is the collaborator spec §9 keeps out of
//! the core to avoid a back-pointer from `Scenario` to a model object.

use chrono::{Datelike, NaiveDate};
use rustc_hash::FxHashMap;

use firegrowth_core::{DailyWeather, Environment, FuelType, Location, SpreadKey, StandardFuel, WeatherStream};

use crate::raster::RasterGrid;

/// Sun-up/sun-down hours derived from a simple geometric day-length model:
/// solar declination from day-of-year, then the hour angle at which the sun
/// crosses the horizon at this latitude. Accurate to within a few minutes,
/// which is all the spread-gate needs.
#[must_use]
pub fn sunrise_sunset_hours(date: NaiveDate, lat_deg: f64, lon_deg: f64, tz_offset_hours: f64) -> (f64, f64) {
    let doy = f64::from(date.ordinal());
    let decl = 23.45_f64.to_radians() * (((360.0 / 365.0) * (doy - 81.0)).to_radians()).sin();
    let lat = lat_deg.to_radians();
    let cos_h = (-decl.tan() * lat.tan()).clamp(-1.0, 1.0);
    let hour_angle_deg = cos_h.acos().to_degrees();
    let day_length_hours = 2.0 * hour_angle_deg / 15.0;
    // true solar noon in this timezone's clock time: 12:00 minus how far the
    // meridian sits west of the timezone's reference longitude.
    let solar_noon = 12.0 - (lon_deg / 15.0 - tz_offset_hours);
    let sunrise = solar_noon - day_length_hours / 2.0;
    let sunset = solar_noon + day_length_hours / 2.0;
    (sunrise.max(0.0), sunset.min(24.0))
}

pub struct RasterEnvironment {
    rows: i32,
    columns: i32,
    cell_size_m: f64,
    fuel_raster: RasterGrid,
    slope_raster: Option<RasterGrid>,
    aspect_raster: Option<RasterGrid>,
    fuel_by_code: FxHashMap<u16, StandardFuel>,
    grid_value_to_code: FxHashMap<u8, u16>,
    non_fuel: StandardFuel,
    weather: WeatherStream,
    start_date: NaiveDate,
    lat_deg: f64,
    lon_deg: f64,
    tz_offset_hours: f64,
    deterministic: bool,
    day_ffmc_threshold: f64,
    night_ffmc_threshold: f64,
    min_ros: f64,
    max_angle_deg: f64,
}

impl RasterEnvironment {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        fuel_raster: RasterGrid,
        slope_raster: Option<RasterGrid>,
        aspect_raster: Option<RasterGrid>,
        cell_size_m: f64,
        fuel_by_code: FxHashMap<u16, StandardFuel>,
        grid_value_to_code: FxHashMap<u8, u16>,
        weather: WeatherStream,
        start_date: NaiveDate,
        lat_deg: f64,
        lon_deg: f64,
        tz_offset_hours: f64,
        deterministic: bool,
    ) -> Self {
        let rows = fuel_raster.rows;
        let columns = fuel_raster.columns;
        RasterEnvironment {
            rows,
            columns,
            cell_size_m,
            fuel_raster,
            slope_raster,
            aspect_raster,
            fuel_by_code,
            grid_value_to_code,
            non_fuel: StandardFuel::non_fuel(0),
            weather,
            start_date,
            lat_deg,
            lon_deg,
            tz_offset_hours,
            deterministic,
            day_ffmc_threshold: 84.0,
            night_ffmc_threshold: 88.0,
            min_ros: 0.1,
            max_angle_deg: 20.0,
        }
    }

    fn date_at(&self, time: f64) -> NaiveDate {
        let day_offset = time.floor() as i64;
        self.start_date + chrono::Duration::days(day_offset)
    }
}

impl Environment for RasterEnvironment {
    fn rows(&self) -> i32 {
        self.rows
    }

    fn columns(&self) -> i32 {
        self.columns
    }

    fn cell_size_m(&self) -> f64 {
        self.cell_size_m
    }

    fn spread_key(&self, loc: Location) -> SpreadKey {
        let row = loc.row();
        let column = loc.column();
        let grid_value = self.fuel_raster.value_at(row, column);
        let fuel_code = self.grid_value_to_code.get(&grid_value).copied().unwrap_or(0);
        let slope = self.slope_raster.as_ref().map_or(0.0, |r| f32::from(r.value_at(row, column)));
        let aspect = self.aspect_raster.as_ref().map_or(0.0, |r| f32::from(r.value_at(row, column)) * (360.0 / 255.0));
        SpreadKey::new(slope, aspect, fuel_code)
    }

    fn fuel_for(&self, key: SpreadKey) -> &dyn FuelType {
        self.fuel_by_code.get(&key.fuel_code).map_or(&self.non_fuel as &dyn FuelType, |f| f as &dyn FuelType)
    }

    fn weather_at(&self, time: f64) -> DailyWeather {
        let date = self.date_at(time);
        self.weather.day_at(date).or_else(|| self.weather.day_at(self.weather.last_date()?)).unwrap_or(
            DailyWeather::new(85.0, 20.0, 200.0, 20.0, 40.0, 10.0, 0.0, 0.0),
        )
    }

    fn is_daytime(&self, time: f64) -> bool {
        let date = self.date_at(time);
        let hour_of_day = (time.fract() * 24.0 + 24.0).rem_euclid(24.0);
        let (sunrise, sunset) = sunrise_sunset_hours(date, self.lat_deg, self.lon_deg, self.tz_offset_hours);
        hour_of_day >= sunrise && hour_of_day < sunset
    }

    fn ffmc_spread_threshold(&self, daytime: bool) -> f64 {
        if daytime {
            self.day_ffmc_threshold
        } else {
            self.night_ffmc_threshold
        }
    }

    fn foliar_moisture_nd(&self, time: f64) -> i32 {
        const GREEN_UP_JULIAN_DAY: i32 = 181;
        let date = self.date_at(time);
        date.ordinal() as i32 - GREEN_UP_JULIAN_DAY
    }

    fn min_ros(&self) -> f64 {
        self.min_ros
    }

    fn max_angle_deg(&self) -> f64 {
        self.max_angle_deg
    }

    fn deterministic(&self) -> bool {
        self.deterministic
    }
}
