//! `Model`: the outer coordinator that runs Iterations until the stop rule
//! is satisfied, a deadline fires, or the simulation-count cap is reached
//! (spec §4.G/§5).
//!
//! `StopReason` is this core's home for the "not an error" outcome spec §7
//! carves out of `CoreError`: `RuntimeLimit` causes graceful wind-down, not
//! process failure, so it lives here as a plain enum rather than inside
//! [`crate::error::CoreError`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::CoreResult;
use crate::iteration::{Iteration, IterationOutcome, ScenarioSpec};
use crate::probability_map::{percentile, ProbabilityMap};
use crate::scenario::Environment;
use crate::thresholds::Thresholds;

/// Why the Model stopped running further Iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop-rule's confidence intervals all fell within tolerance.
    Converged,
    /// The wall-clock deadline fired before convergence.
    Deadline,
    /// The configured simulation-count cap was reached.
    SimCountLimit,
}

/// Wall-clock deadline and simulation-count cap, spec §5's "soft wall-clock
/// deadline and a hard simulation-count limit both cause `shouldStop() =
/// true`".
#[derive(Debug, Clone, Copy)]
pub struct StopRule {
    pub confidence_level: f64,
    pub max_runtime: Option<Duration>,
    pub max_iterations: Option<u32>,
}

impl StopRule {
    #[must_use]
    pub fn new(confidence_level: f64) -> Self {
        StopRule { confidence_level, max_runtime: None, max_iterations: None }
    }
}

/// Running statistics across completed Iterations: the sorted vector of
/// every observed fire size (`all_sizes`) plus per-iteration mean and
/// 95th-percentile sequences, spec §4.G.
#[derive(Debug, Default)]
pub struct ModelStatistics {
    all_sizes: Vec<f64>,
    means: Vec<f64>,
    percentile_95s: Vec<f64>,
}

impl ModelStatistics {
    #[must_use]
    pub fn new() -> Self {
        ModelStatistics::default()
    }

    pub fn add_statistics(&mut self, iteration_sizes: &[f64]) {
        if iteration_sizes.is_empty() {
            return;
        }
        let mean = iteration_sizes.iter().sum::<f64>() / iteration_sizes.len() as f64;
        self.means.push(mean);
        self.percentile_95s.push(percentile(iteration_sizes, 0.95));
        for &size in iteration_sizes {
            let pos = self.all_sizes.partition_point(|&x| x < size);
            self.all_sizes.insert(pos, size);
        }
    }

    #[must_use]
    pub fn iterations_recorded(&self) -> usize {
        self.means.len()
    }

    /// Student-t confidence interval half-width on a sample, relative to its
    /// mean. Returns `None` when fewer than two samples exist (no variance
    /// estimate possible).
    fn relative_margin(sample: &[f64], confidence_level: f64) -> Option<f64> {
        if sample.len() < 2 {
            return None;
        }
        let n = sample.len();
        let mean = sample.iter().sum::<f64>() / n as f64;
        if mean.abs() < 1e-9 {
            return Some(0.0);
        }
        let variance = sample.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
        let std_dev = variance.sqrt();
        let t = t_critical(n - 1, confidence_level);
        let margin = t * std_dev / (n as f64).sqrt();
        Some((margin / mean).abs())
    }

    /// How many additional Iterations the stop rule demands, per spec
    /// §4.G: zero once the confidence interval on the mean, on the 95th
    /// percentile, and on the raw sizes all fall within tolerance of
    /// `confidence_level`.
    #[must_use]
    pub fn runs_required(&self, confidence_level: f64) -> u32 {
        let tolerance = 1.0 - confidence_level;
        let checks = [
            Self::relative_margin(&self.means, confidence_level),
            Self::relative_margin(&self.percentile_95s, confidence_level),
            Self::relative_margin(&self.all_sizes, confidence_level),
        ];

        let mut worst_overshoot = 0.0_f64;
        let mut any_insufficient = false;
        for check in checks {
            match check {
                None => any_insufficient = true,
                Some(margin) if margin > tolerance => {
                    worst_overshoot = worst_overshoot.max(margin / tolerance.max(1e-9));
                }
                Some(_) => {}
            }
        }

        if !any_insufficient && worst_overshoot <= 1.0 {
            return 0;
        }
        if any_insufficient {
            return 1;
        }
        // Margin shrinks roughly as 1/sqrt(n); scale current sample size by
        // the squared overshoot to estimate the additional runs needed.
        let n = self.iterations_recorded().max(1) as f64;
        ((n * worst_overshoot * worst_overshoot) - n).ceil().max(1.0) as u32
    }
}

/// Two-sided Student-t critical value, linearly interpolated from a small
/// table of common confidence levels and degrees of freedom; falls back to
/// the standard normal z-value once `df` is large enough that the t and
/// normal distributions are indistinguishable for this purpose.
fn t_critical(df: usize, confidence_level: f64) -> f64 {
    const DF_TABLE: [usize; 10] = [1, 2, 3, 4, 5, 10, 15, 20, 25, 30];
    const T_90: [f64; 10] = [6.314, 2.920, 2.353, 2.132, 2.015, 1.812, 1.753, 1.725, 1.708, 1.697];
    const T_95: [f64; 10] = [12.706, 4.303, 3.182, 2.776, 2.571, 2.228, 2.131, 2.086, 2.060, 2.042];
    const T_99: [f64; 10] = [63.657, 9.925, 5.841, 4.604, 4.032, 3.169, 2.947, 2.845, 2.787, 2.750];

    if df == 0 {
        return f64::INFINITY;
    }
    if df > 30 {
        return z_critical(confidence_level);
    }
    let idx = DF_TABLE.iter().position(|&d| d >= df).unwrap_or(DF_TABLE.len() - 1);
    let table = if confidence_level >= 0.985 {
        &T_99
    } else if confidence_level >= 0.925 {
        &T_95
    } else {
        &T_90
    };
    table[idx]
}

fn z_critical(confidence_level: f64) -> f64 {
    if confidence_level >= 0.985 {
        2.576
    } else if confidence_level >= 0.925 {
        1.960
    } else {
        1.645
    }
}

/// The global `ProbabilityMap` set (one per save time), mutex-guarded so
/// every Iteration's contribution merges in under a short critical section
/// (spec §5).
pub struct GlobalProbability {
    maps: Mutex<Vec<ProbabilityMap>>,
}

impl GlobalProbability {
    #[must_use]
    pub fn new(n_saves: usize) -> Self {
        GlobalProbability { maps: Mutex::new((0..n_saves).map(|_| ProbabilityMap::new()).collect()) }
    }

    pub fn merge_iteration(&self, outcome: &IterationOutcome) {
        let mut maps = self.maps.lock().expect("global probability mutex poisoned");
        for (slot, pm) in maps.iter_mut().zip(&outcome.probability_by_save) {
            slot.merge(pm);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ProbabilityMap> {
        self.maps.lock().expect("global probability mutex poisoned").clone()
    }
}

/// Coordinates Iterations against a `StopRule`, spawning a timer thread that
/// polls the deadline and flips a shared cancellation flag (spec §5's "timer
/// thread sleeps 1 second between deadline checks").
pub struct Model {
    rule: StopRule,
    statistics: ModelStatistics,
    global: GlobalProbability,
    started_at: Option<Instant>,
}

impl Model {
    #[must_use]
    pub fn new(rule: StopRule, n_saves: usize) -> Self {
        Model { rule, statistics: ModelStatistics::new(), global: GlobalProbability::new(n_saves), started_at: None }
    }

    #[must_use]
    pub fn statistics(&self) -> &ModelStatistics {
        &self.statistics
    }

    #[must_use]
    pub fn global_probability(&self) -> &GlobalProbability {
        &self.global
    }

    /// Run Iterations (built from `next_iteration`) until the stop rule is
    /// satisfied or a limit fires. `next_iteration(n)` returns the `n`th
    /// Iteration's spec; the closure owns weather-stream/seed assignment.
    ///
    /// Returns `Err` if an Iteration reports a fatal `DomainError` (spec §7:
    /// ignition point has no fuel within half the grid); the timer thread is
    /// still joined before the error propagates.
    pub fn run<F>(&mut self, mut next_iteration: F) -> CoreResult<StopReason>
    where
        F: FnMut(u32) -> (Iteration, Vec<ScenarioSpec<'_>>),
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.started_at = Some(Instant::now());
        let deadline_flag = Arc::clone(&cancelled);
        let deadline = self.rule.max_runtime;
        let started_at = self.started_at.expect("just set");
        let timer_handle = deadline.map(|d| {
            std::thread::spawn(move || loop {
                if deadline_flag.load(Ordering::Relaxed) {
                    return;
                }
                if started_at.elapsed() >= d {
                    deadline_flag.store(true, Ordering::Relaxed);
                    return;
                }
                std::thread::sleep(Duration::from_secs(1));
            })
        });

        let mut iterations_attempted: u32 = 0;
        let mut iterations_with_results: u32 = 0;
        let reason = loop {
            if let Some(max) = self.rule.max_iterations {
                if iterations_attempted >= max {
                    break StopReason::SimCountLimit;
                }
            }
            if cancelled.load(Ordering::Relaxed) {
                break StopReason::Deadline;
            }

            let (iteration, specs) = next_iteration(iterations_attempted);
            iterations_attempted += 1;
            let outcome = match iteration.run(specs, &cancelled) {
                Ok(outcome) => outcome,
                Err(e) => {
                    cancelled.store(true, Ordering::Relaxed);
                    if let Some(handle) = timer_handle {
                        let _ = handle.join();
                    }
                    return Err(e);
                }
            };
            if outcome.completed > 0 {
                self.statistics.add_statistics(&outcome.sizes_ha);
                self.global.merge_iteration(&outcome);
                iterations_with_results += 1;
            }

            if cancelled.load(Ordering::Relaxed) {
                break StopReason::Deadline;
            }
            if self.statistics.runs_required(self.rule.confidence_level) == 0 && iterations_with_results > 0 {
                break StopReason::Converged;
            }
        };

        cancelled.store(true, Ordering::Relaxed);
        if let Some(handle) = timer_handle {
            let _ = handle.join();
        }
        Ok(reason)
    }
}

/// Convenience helper for building per-scenario seeded thresholds from a
/// scenario index, sharing one scenario weight configuration.
#[must_use]
pub fn thresholds_for_scenario(hours: usize, scenario_seed: u64, deterministic: bool) -> Thresholds {
    if deterministic {
        Thresholds::zeroed(hours)
    } else {
        Thresholds::seeded(hours, scenario_seed, 1.0, 1.0, 1.0)
    }
}

#[allow(dead_code)]
fn assert_environment_object_safe(_: &dyn Environment) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_required_is_one_with_single_sample() {
        let mut stats = ModelStatistics::new();
        stats.add_statistics(&[30.0, 45.0, 60.0]);
        assert_eq!(stats.runs_required(0.95), 1);
    }

    #[test]
    fn runs_required_drops_to_zero_on_tight_repeated_samples() {
        let mut stats = ModelStatistics::new();
        for _ in 0..40 {
            stats.add_statistics(&[50.0, 50.1, 49.9, 50.05]);
        }
        assert_eq!(stats.runs_required(0.90), 0);
    }

    #[test]
    fn t_critical_shrinks_toward_z_as_df_grows() {
        let small = t_critical(2, 0.95);
        let large = t_critical(100, 0.95);
        assert!(small > large);
        assert!((large - 1.960).abs() < 1e-6);
    }

    #[test]
    fn model_stops_at_sim_count_limit() {
        let rule = StopRule { confidence_level: 0.9999, max_runtime: None, max_iterations: Some(2) };
        let mut model = Model::new(rule, 1);
        let mut calls = 0;
        let reason = model
            .run(|_n| {
                calls += 1;
                (Iteration::new(crate::grid::Location::new(0, 0), 0.0, vec![0.1], None), Vec::new())
            })
            .expect("no domain error");
        assert_eq!(reason, StopReason::SimCountLimit);
        assert_eq!(calls, 2);
    }
}
