//! Seeded per-hour threshold vectors (spec §3): deterministic conversions of
//! uniform draws into extinction/spread probability thresholds, one entry
//! per elapsed hour of the scenario.
//!
//! Grounded in the teacher's preference for small seedable structs wrapping
//! `rand::rngs::StdRng` over ambient global RNG state (see
//! `solver::stochastic` usage of per-call `StdRng::seed_from_u64` in the
//! teacher tree).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Two parallel hour-indexed vectors of `[0, 1]` thresholds: one used to
/// stochastically suppress marginal spread, one used by the survival test.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub extinction: Vec<f64>,
    pub spread_by_ros: Vec<f64>,
}

impl Thresholds {
    /// All-zero thresholds: in deterministic mode every threshold compares
    /// as "always survive, never suppress".
    #[must_use]
    pub fn zeroed(hours: usize) -> Self {
        Thresholds { extinction: vec![0.0; hours], spread_by_ros: vec![0.0; hours] }
    }

    /// Seeded generation per spec §3: three seeded uniform draws (scenario,
    /// day, hour) combined by configured weights, one pair of thresholds per
    /// elapsed hour.
    #[must_use]
    pub fn seeded(hours: usize, scenario_seed: u64, scenario_weight: f64, day_weight: f64, hour_weight: f64) -> Self {
        let mut scenario_rng = StdRng::seed_from_u64(scenario_seed);
        let scenario_draw: f64 = scenario_rng.gen_range(0.0..1.0);

        let mut extinction = Vec::with_capacity(hours);
        let mut spread_by_ros = Vec::with_capacity(hours);
        for hour in 0..hours {
            let day = hour / 24;
            let mut day_rng = StdRng::seed_from_u64(scenario_seed ^ (day as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let day_draw: f64 = day_rng.gen_range(0.0..1.0);
            let mut hour_rng =
                StdRng::seed_from_u64(scenario_seed ^ (hour as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F));
            let hour_draw_e: f64 = hour_rng.gen_range(0.0..1.0);
            let hour_draw_s: f64 = hour_rng.gen_range(0.0..1.0);

            let total_weight = scenario_weight + day_weight + hour_weight;
            let combine = |hour_draw: f64| {
                if total_weight <= 0.0 {
                    0.0
                } else {
                    ((scenario_draw * scenario_weight + day_draw * day_weight + hour_draw * hour_weight)
                        / total_weight)
                        .clamp(0.0, 1.0)
                }
            };
            extinction.push(combine(hour_draw_e));
            spread_by_ros.push(combine(hour_draw_s));
        }
        Thresholds { extinction, spread_by_ros }
    }

    #[must_use]
    pub fn extinction_at(&self, hour_index: usize) -> f64 {
        self.extinction.get(hour_index).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn spread_by_ros_at(&self, hour_index: usize) -> f64 {
        self.spread_by_ros.get(hour_index).copied().unwrap_or(0.0)
    }
}

/// `(last_date - start_day + 2) * 24`, the vector length spec §3 mandates.
#[must_use]
pub fn hour_count(start_day: chrono::NaiveDate, last_date: chrono::NaiveDate) -> usize {
    let days = (last_date - start_day).num_days().max(0) + 2;
    (days as usize) * 24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_thresholds_never_suppress() {
        let t = Thresholds::zeroed(48);
        assert_eq!(t.extinction_at(10), 0.0);
        assert_eq!(t.spread_by_ros_at(10), 0.0);
    }

    #[test]
    fn seeded_thresholds_are_bounded() {
        let t = Thresholds::seeded(48, 42, 1.0, 1.0, 1.0);
        for &v in t.extinction.iter().chain(t.spread_by_ros.iter()) {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn seeded_thresholds_are_deterministic_for_same_seed() {
        let a = Thresholds::seeded(24, 7, 1.0, 1.0, 1.0);
        let b = Thresholds::seeded(24, 7, 1.0, 1.0, 1.0);
        assert_eq!(a.extinction, b.extinction);
        assert_eq!(a.spread_by_ros, b.spread_by_ros);
    }

    #[test]
    fn hour_count_matches_spec_formula() {
        let start = chrono::NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
        let last = chrono::NaiveDate::from_ymd_opt(2020, 6, 16).unwrap();
        assert_eq!(hour_count(start, last), 3 * 24);
    }
}
