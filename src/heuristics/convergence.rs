//! Early-stop policy shared by the population solvers.
//!
//! From a configured fraction of the iteration budget onward, a run stops once the
//! best cost of the current population is within `tolerance` of the population
//! mean. This signals that diversity has collapsed; it is known to fire early on
//! some instances, so it can be tuned or switched off rather than hard-coded.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePolicy {
    pub enabled: bool,
    /// Fraction of `max_iterations` after which the check starts.
    pub start_fraction: f64,
    /// Relative gap between minimum and mean cost that counts as collapsed.
    pub tolerance: f64,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        ConvergencePolicy {
            enabled: true,
            start_fraction: 0.2,
            tolerance: 0.01,
        }
    }
}

impl ConvergencePolicy {
    pub fn disabled() -> Self {
        ConvergencePolicy {
            enabled: false,
            ..Default::default()
        }
    }

    /// First iteration index at which the check is evaluated.
    pub fn first_checked_iteration(&self, max_iterations: usize) -> usize {
        (max_iterations as f64 * self.start_fraction + 1e-9).floor() as usize
    }

    pub fn should_stop(&self, iteration: usize, max_iterations: usize, costs: &[f64]) -> bool {
        self.enabled
            && iteration >= self.first_checked_iteration(max_iterations)
            && has_converged(costs, self.tolerance)
    }
}

/// `min * (1 + tolerance) > mean` over `costs`.
pub fn has_converged(costs: &[f64], tolerance: f64) -> bool {
    if costs.is_empty() {
        return false;
    }
    let mean = costs.iter().sum::<f64>() / costs.len() as f64;
    let min = costs.iter().cloned().fold(f64::INFINITY, f64::min);
    min * (1.0 + tolerance) > mean
}
