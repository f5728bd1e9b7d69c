//! `ProbabilityMap`: per-save-time aggregate of many scenario outcomes into
//! four count grids (total/low/moderate/high intensity) plus a sorted vector
//! of final fire sizes (spec §3/§4.H).
//!
//! Aggregation is commutative integer addition per cell, so `merge` (used to
//! fold per-scenario and per-iteration maps together under the teacher's
//! mutex-guarded-shared-state convention, see [`crate::intensity_map`]) never
//! needs ordering guarantees between contributors.

use rustc_hash::FxHashMap;

/// Intensity bin thresholds (kW/m), matching common FBP fire-behaviour
/// reporting bands.
pub const LOW_INTENSITY_MAX: u32 = 500;
pub const MODERATE_INTENSITY_MAX: u32 = 4000;

#[must_use]
pub fn intensity_bin(intensity: u32) -> IntensityBin {
    if intensity == 0 {
        IntensityBin::Unburned
    } else if intensity <= LOW_INTENSITY_MAX {
        IntensityBin::Low
    } else if intensity <= MODERATE_INTENSITY_MAX {
        IntensityBin::Moderate
    } else {
        IntensityBin::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityBin {
    Unburned,
    Low,
    Moderate,
    High,
}

#[derive(Debug, Default, Clone)]
pub struct ProbabilityMap {
    total: FxHashMap<u64, u32>,
    low: FxHashMap<u64, u32>,
    moderate: FxHashMap<u64, u32>,
    high: FxHashMap<u64, u32>,
    fire_sizes_ha: Vec<f64>,
    scenarios_added: u32,
}

impl ProbabilityMap {
    #[must_use]
    pub fn new() -> Self {
        ProbabilityMap::default()
    }

    /// Fold one scenario's final `IntensityMap` into the aggregate.
    pub fn add_probability(&mut self, burned_snapshot: &[(u64, u32)], fire_size_ha: f64) {
        for &(hash, intensity) in burned_snapshot {
            *self.total.entry(hash).or_insert(0) += 1;
            match intensity_bin(intensity) {
                IntensityBin::Low => *self.low.entry(hash).or_insert(0) += 1,
                IntensityBin::Moderate => *self.moderate.entry(hash).or_insert(0) += 1,
                IntensityBin::High => *self.high.entry(hash).or_insert(0) += 1,
                IntensityBin::Unburned => {}
            }
        }
        let pos = self.fire_sizes_ha.partition_point(|&x| x < fire_size_ha);
        self.fire_sizes_ha.insert(pos, fire_size_ha);
        self.scenarios_added += 1;
    }

    /// Fold another `ProbabilityMap`'s counts into `self`, insertion-order
    /// independent since both sides use integer addition and sorted
    /// insertion (spec §8 invariant 7).
    pub fn merge(&mut self, other: &ProbabilityMap) {
        for (hash, count) in &other.total {
            *self.total.entry(*hash).or_insert(0) += count;
        }
        for (hash, count) in &other.low {
            *self.low.entry(*hash).or_insert(0) += count;
        }
        for (hash, count) in &other.moderate {
            *self.moderate.entry(*hash).or_insert(0) += count;
        }
        for (hash, count) in &other.high {
            *self.high.entry(*hash).or_insert(0) += count;
        }
        for &size in &other.fire_sizes_ha {
            let pos = self.fire_sizes_ha.partition_point(|&x| x < size);
            self.fire_sizes_ha.insert(pos, size);
        }
        self.scenarios_added += other.scenarios_added;
    }

    #[must_use]
    pub fn scenarios_added(&self) -> u32 {
        self.scenarios_added
    }

    #[must_use]
    pub fn total_count(&self, hash: u64) -> u32 {
        self.total.get(&hash).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn probability(&self, hash: u64) -> f64 {
        if self.scenarios_added == 0 {
            return 0.0;
        }
        f64::from(self.total_count(hash)) / f64::from(self.scenarios_added)
    }

    #[must_use]
    pub fn bin_count(&self, hash: u64, bin: IntensityBin) -> u32 {
        match bin {
            IntensityBin::Unburned => 0,
            IntensityBin::Low => self.low.get(&hash).copied().unwrap_or(0),
            IntensityBin::Moderate => self.moderate.get(&hash).copied().unwrap_or(0),
            IntensityBin::High => self.high.get(&hash).copied().unwrap_or(0),
        }
    }

    #[must_use]
    pub fn fire_sizes_ha(&self) -> &[f64] {
        &self.fire_sizes_ha
    }

    /// Burned cell hashes observed across every contributing scenario.
    pub fn burned_cells(&self) -> impl Iterator<Item = u64> + '_ {
        self.total.keys().copied()
    }

    /// Sample mean of final fire sizes.
    #[must_use]
    pub fn mean_size(&self) -> f64 {
        if self.fire_sizes_ha.is_empty() {
            return 0.0;
        }
        self.fire_sizes_ha.iter().sum::<f64>() / self.fire_sizes_ha.len() as f64
    }

    /// 95th percentile of final fire sizes, computed on the already-sorted
    /// vector with linear interpolation.
    #[must_use]
    pub fn percentile_95(&self) -> f64 {
        percentile(&self.fire_sizes_ha, 0.95)
    }

    pub fn reset(&mut self) {
        *self = ProbabilityMap::default();
    }
}

#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_bins_match_thresholds() {
        assert_eq!(intensity_bin(0), IntensityBin::Unburned);
        assert_eq!(intensity_bin(100), IntensityBin::Low);
        assert_eq!(intensity_bin(1000), IntensityBin::Moderate);
        assert_eq!(intensity_bin(10000), IntensityBin::High);
    }

    #[test]
    fn add_probability_accumulates_counts() {
        let mut pm = ProbabilityMap::new();
        pm.add_probability(&[(1, 100), (2, 5000)], 30.0);
        pm.add_probability(&[(1, 200)], 45.0);
        assert_eq!(pm.total_count(1), 2);
        assert_eq!(pm.total_count(2), 1);
        assert_eq!(pm.bin_count(2, IntensityBin::High), 1);
        assert_eq!(pm.fire_sizes_ha(), &[30.0, 45.0]);
    }

    #[test]
    fn additivity_holds_across_disjoint_merges() {
        let mut a = ProbabilityMap::new();
        a.add_probability(&[(1, 100)], 10.0);
        let mut b = ProbabilityMap::new();
        b.add_probability(&[(1, 200), (2, 50)], 20.0);

        let mut merged = ProbabilityMap::new();
        merged.merge(&a);
        merged.merge(&b);

        let mut direct = ProbabilityMap::new();
        direct.add_probability(&[(1, 100)], 10.0);
        direct.add_probability(&[(1, 200), (2, 50)], 20.0);

        assert_eq!(merged.total_count(1), direct.total_count(1));
        assert_eq!(merged.total_count(2), direct.total_count(2));
        assert_eq!(merged.fire_sizes_ha(), direct.fire_sizes_ha());
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut pm = ProbabilityMap::new();
        pm.add_probability(&[(1, 100)], 10.0);
        pm.reset();
        assert_eq!(pm.scenarios_added(), 0);
        assert!(pm.fire_sizes_ha().is_empty());
    }

    #[test]
    fn percentile_95_on_sorted_vector() {
        let sizes = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        assert!((percentile(&sizes, 0.95) - 48.0).abs() < 1e-9);
    }
}
