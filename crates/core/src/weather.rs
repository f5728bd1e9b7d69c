//! Fire-weather collaborator types: the Canadian FWI components the core
//! consumes as already-computed inputs (spec §1's "weather-file parsing and
//! FWI index recomputation" Non-goal keeps derivation itself out of scope),
//! plus the per-scenario weather stream that supplies them hour by hour.
//!
//! Shaped after the teacher's `WeatherSystem`/`WeatherPreset` split in
//! `weather.rs`: a small current-state struct plus a table of per-day/season
//! records the simulation steps through, adapted from the teacher's diurnal
//! calendar model to the FWI system's daily cadence.

use chrono::{Datelike, NaiveDate};

/// One day's weather observation, in the schema of the spec's weather CSV
/// (`Scenario,Date,PREC,TEMP,RH,WS,WD`) plus the FWI indices derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyWeather {
    pub ffmc: f64,
    pub dmc: f64,
    pub dc: f64,
    pub temp_c: f64,
    pub rh_pct: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction_deg: f64,
    pub precip_mm: f64,
}

impl DailyWeather {
    #[must_use]
    pub fn new(
        ffmc: f64,
        dmc: f64,
        dc: f64,
        temp_c: f64,
        rh_pct: f64,
        wind_speed_kmh: f64,
        wind_direction_deg: f64,
        precip_mm: f64,
    ) -> Self {
        DailyWeather { ffmc, dmc, dc, temp_c, rh_pct, wind_speed_kmh, wind_direction_deg, precip_mm }
    }

    /// Initial Spread Index from FFMC and wind speed (FWI system, closed
    /// form used throughout the FBP literature).
    #[must_use]
    pub fn isi(&self) -> f64 {
        let m = 147.2 * (101.0 - self.ffmc) / (59.5 + self.ffmc);
        let ff = (91.9 * (-0.1386 * m).exp()) * (1.0 + m.powf(5.31) / 4_930_796.52);
        0.208 * (0.05039 * self.wind_speed_kmh).exp() * ff
    }

    /// Buildup Index from DMC and DC.
    #[must_use]
    pub fn bui(&self) -> f64 {
        if self.dmc <= 0.4 * self.dc {
            (0.8 * self.dmc * self.dc) / (self.dmc + 0.4 * self.dc).max(1e-9)
        } else {
            self.dmc
                - (1.0 - 0.8 * self.dc / (self.dmc + 0.4 * self.dc).max(1e-9))
                    * (0.92 + (0.0114 * self.dmc).powf(1.7))
        }
        .max(0.0)
    }

    /// Cured-fuel scaling used by `StandardFuel::calculate_ros`. Drier air
    /// (lower relative humidity) and higher temperature push curing up.
    #[must_use]
    pub fn curing_factor(&self) -> f64 {
        let rh_term = (1.0 - self.rh_pct / 100.0).clamp(0.0, 1.0);
        (0.5 + 0.5 * rh_term).clamp(0.3, 1.0)
    }

    /// Rough duff moisture fraction used by the survival test and
    /// `StandardFuel::survival_probability`.
    #[must_use]
    pub fn duff_moisture_fraction(&self) -> f64 {
        (self.dmc / 150.0).clamp(0.0, 1.0)
    }

    /// `nd`-adjacent foliar-moisture offset placeholder, consumed by
    /// `critical_surface_intensity`.
    #[must_use]
    pub fn foliar_moisture_offset_days(&self) -> f64 {
        self.dc.rem_euclid(365.0)
    }
}

/// A wrapper distinguishing "today's" weather from yesterday's startup
/// values the FWI recursion needs at the very first hour of a scenario.
#[derive(Debug, Clone, Copy)]
pub struct FwiWeather {
    pub today: DailyWeather,
    pub yesterday_dmc: f64,
    pub yesterday_dc: f64,
}

impl FwiWeather {
    #[must_use]
    pub fn new(today: DailyWeather, yesterday_dmc: f64, yesterday_dc: f64) -> Self {
        FwiWeather { today, yesterday_dmc, yesterday_dc }
    }
}

/// A single scenario's parsed weather CSV rows (spec §6), one per day,
/// strictly sequential and never crossing a year boundary.
#[derive(Debug, Clone)]
pub struct WeatherStream {
    pub scenario_id: u32,
    dates: Vec<NaiveDate>,
    days: Vec<DailyWeather>,
}

impl WeatherStream {
    #[must_use]
    pub fn new(scenario_id: u32) -> Self {
        WeatherStream { scenario_id, dates: Vec::new(), days: Vec::new() }
    }

    /// Append a day's row, enforcing spec §6's strict-sequential,
    /// no-year-crossing constraint. Returns `Err` with a description on
    /// violation; the caller maps this into `CoreError::InputData`.
    pub fn push_day(&mut self, date: NaiveDate, weather: DailyWeather) -> Result<(), String> {
        if let Some(&last) = self.dates.last() {
            if date <= last {
                return Err(format!("day {date} does not strictly follow {last}"));
            }
            if date.year() != last.year() {
                return Err(format!("scenario {} weather crosses a year boundary", self.scenario_id));
            }
        }
        self.dates.push(date);
        self.days.push(weather);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Weather for the day at `date`, if covered by this stream.
    #[must_use]
    pub fn day_at(&self, date: NaiveDate) -> Option<DailyWeather> {
        self.dates.iter().position(|&d| d == date).map(|i| self.days[i])
    }

    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Whether this stream covers every day from `start` through `end`
    /// inclusive, spec §6's "weather does not cover the required save
    /// horizon" validation.
    #[must_use]
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        let mut d = start;
        while d <= end {
            if self.day_at(d).is_none() {
                return false;
            }
            d = d.succ_opt().expect("date overflow");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(ffmc: f64, wind: f64) -> DailyWeather {
        DailyWeather::new(ffmc, 35.5, 275.0, 20.0, 30.0, wind, 0.0, 0.0)
    }

    #[test]
    fn isi_increases_with_wind() {
        let calm = day(90.0, 0.0).isi();
        let windy = day(90.0, 30.0).isi();
        assert!(windy > calm);
    }

    #[test]
    fn bui_is_nonnegative() {
        let w = day(90.0, 10.0);
        assert!(w.bui() >= 0.0);
    }

    #[test]
    fn stream_rejects_non_sequential_days() {
        let mut s = WeatherStream::new(1);
        let d1 = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
        let d0 = NaiveDate::from_ymd_opt(2020, 6, 14).unwrap();
        s.push_day(d1, day(90.0, 0.0)).unwrap();
        assert!(s.push_day(d0, day(90.0, 0.0)).is_err());
    }

    #[test]
    fn stream_rejects_year_crossing() {
        let mut s = WeatherStream::new(1);
        let d1 = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        s.push_day(d1, day(90.0, 0.0)).unwrap();
        assert!(s.push_day(d2, day(90.0, 0.0)).is_err());
    }

    #[test]
    fn covers_checks_full_range() {
        let mut s = WeatherStream::new(1);
        let d1 = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2020, 6, 16).unwrap();
        s.push_day(d1, day(90.0, 0.0)).unwrap();
        s.push_day(d2, day(90.0, 0.0)).unwrap();
        assert!(s.covers(d1, d2));
        assert!(!s.covers(d1, d2.succ_opt().unwrap()));
    }
}
