//! Solution representation shared by every solver.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::Graph;

/// Cost reported by the exact solver when no single Hamiltonian cycle was
/// reached within its budget. No real tour cost can take this value.
pub const UNRESOLVED_COST: f64 = f64::NEG_INFINITY;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// `run()` has not been called yet.
    NotStarted,
    /// A full pass found no improving move.
    LocalOptimum,
    /// Annealing temperature dropped below zero.
    Frozen,
    /// Population cost collapsed onto its minimum (early-stop policy).
    Converged,
    /// Generation / iteration cap reached.
    IterationLimit,
    /// Wall-clock budget exhausted; the solution is the best found so far.
    TimeLimit,
    /// Exact solver proved a single Hamiltonian cycle optimal.
    Optimal,
    /// Exact solver ended without a single-cycle assignment.
    Unresolved,
}

impl Termination {
    pub fn timed_out(&self) -> bool {
        matches!(self, Termination::TimeLimit)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Termination::NotStarted => "not started",
            Termination::LocalOptimum => "local optimum",
            Termination::Frozen => "frozen",
            Termination::Converged => "converged",
            Termination::IterationLimit => "iteration limit",
            Termination::TimeLimit => "time limit",
            Termination::Optimal => "optimal",
            Termination::Unresolved => "unresolved",
        };
        f.write_str(label)
    }
}

/// Best tour of a run plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Vertex positions; the closing edge last -> first is implicit.
    pub tour: Vec<usize>,
    pub cost: f64,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Generations, iterations, sweeps or solve calls, depending on the solver
    pub iterations: Option<usize>,
    pub termination: Termination,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            tour: Vec::new(),
            cost: f64::INFINITY,
            algorithm: String::new(),
            computation_time: 0.0,
            iterations: None,
            termination: Termination::NotStarted,
        }
    }

    pub fn from_tour(graph: &Graph, tour: Vec<usize>, algorithm: &str) -> Self {
        let cost = graph.tour_cost(&tour);
        Solution {
            tour,
            cost,
            algorithm: algorithm.to_string(),
            ..Solution::new()
        }
    }

    /// Exact-solver result when the cutting-plane loop could not finish.
    pub fn unresolved(algorithm: &str) -> Self {
        Solution {
            cost: UNRESOLVED_COST,
            algorithm: algorithm.to_string(),
            termination: Termination::Unresolved,
            ..Solution::new()
        }
    }

    /// False only for the unresolved sentinel; callers check this before trusting `tour`.
    pub fn is_resolved(&self) -> bool {
        self.cost != UNRESOLVED_COST
    }

    /// Recompute the cost from scratch.
    pub fn validate(&mut self, graph: &Graph) {
        self.cost = graph.tour_cost(&self.tour);
    }

    /// Every position `0..n` appears exactly once.
    pub fn is_permutation(&self, n: usize) -> bool {
        is_permutation(&self.tour, n)
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        if self.is_resolved() {
            writeln!(f, "  Cost: {:.2}", self.cost)?;
        } else {
            writeln!(f, "  Cost: unresolved")?;
        }
        writeln!(f, "  Termination: {}", self.termination)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        writeln!(f, "  Tour: {:?}", self.tour)
    }
}

/// Common surface of every solver: build with a graph and a config, `run()`,
/// then read the best tour back.
pub trait Solver {
    fn name(&self) -> &str;

    /// Execute until convergence, the iteration cap or the time budget.
    fn run(&mut self) -> Solution;

    /// Best solution known so far (the initial one before `run()`).
    fn best(&self) -> &Solution;

    /// Wall-clock time spent in the last `run()`.
    fn elapsed(&self) -> Duration;
}

/// Every position `0..n` appears exactly once in `tour`.
pub fn is_permutation(tour: &[usize], n: usize) -> bool {
    if tour.len() != n {
        return false;
    }
    let unique: HashSet<usize> = tour.iter().copied().filter(|&v| v < n).collect();
    unique.len() == n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::unit_square;

    #[test]
    fn test_solution_creation() {
        let sol = Solution::new();
        assert!(sol.tour.is_empty());
        assert_eq!(sol.cost, f64::INFINITY);
        assert_eq!(sol.termination, Termination::NotStarted);
        assert!(sol.is_resolved());
    }

    #[test]
    fn test_from_tour_costs_closing_edge() {
        let graph = unit_square();
        let sol = Solution::from_tour(&graph, vec![3, 2, 1, 0], "test");
        assert!((sol.cost - 4.0).abs() < 1e-12);
        assert!(sol.is_permutation(4));
    }

    #[test]
    fn test_unresolved_sentinel() {
        let sol = Solution::unresolved("exact");
        assert!(!sol.is_resolved());
        assert_eq!(sol.termination, Termination::Unresolved);
        assert!(sol.cost < f64::MIN);
    }

    #[test]
    fn test_permutation_check() {
        assert!(is_permutation(&[2, 0, 1], 3));
        assert!(!is_permutation(&[2, 0, 0], 3));
        assert!(!is_permutation(&[0, 1], 3));
        assert!(!is_permutation(&[0, 1, 3], 3));
    }
}
