//! Held-Karp bitmask dynamic programming.
//!
//! `cost[mask][last]` is the cheapest path that starts at vertex 0, visits the
//! vertices in `mask` (bit `v - 1` for vertex `v`) and ends at `last`.
//! Memory grows as `n * 2^(n-1)`, so graphs are capped at [`MAX_VERTICES`].

use std::time::{Duration, Instant};

use log::info;

use crate::error::{Result, TspError};
use crate::graph::Graph;
use crate::solution::{Solution, Solver, Termination};

pub const MAX_VERTICES: usize = 20;

const NO_PARENT: u8 = u8::MAX;

/// Optimal tour (starting at vertex 0) and its cost.
pub fn held_karp(graph: &Graph) -> Result<(Vec<usize>, f64)> {
    let n = graph.len();
    if n > MAX_VERTICES {
        return Err(TspError::TooLarge { method: "held-karp", limit: MAX_VERTICES, size: n });
    }
    if n <= 2 {
        let tour: Vec<usize> = graph.vertex_indices().collect();
        let cost = graph.tour_cost(&tour);
        return Ok((tour, cost));
    }

    let m = n - 1;
    let full = (1usize << m) - 1;
    let mut cost = vec![f64::INFINITY; (full + 1) * n];
    let mut parent = vec![NO_PARENT; (full + 1) * n];

    for v in 1..n {
        cost[(1 << (v - 1)) * n + v] = graph.cost(0, v);
        parent[(1 << (v - 1)) * n + v] = 0;
    }

    for mask in 1..=full {
        for last in 1..n {
            let bit = 1 << (last - 1);
            if mask & bit == 0 {
                continue;
            }
            let here = cost[mask * n + last];
            if !here.is_finite() {
                continue;
            }
            for next in 1..n {
                let next_bit = 1 << (next - 1);
                if mask & next_bit != 0 {
                    continue;
                }
                let extended = mask | next_bit;
                let candidate = here + graph.cost(last, next);
                if candidate < cost[extended * n + next] {
                    cost[extended * n + next] = candidate;
                    parent[extended * n + next] = last as u8;
                }
            }
        }
    }

    let mut best_last = 1;
    let mut best_cost = f64::INFINITY;
    for last in 1..n {
        let total = cost[full * n + last] + graph.cost(last, 0);
        if total < best_cost {
            best_cost = total;
            best_last = last;
        }
    }

    let mut tour = Vec::with_capacity(n);
    let mut mask = full;
    let mut current = best_last;
    while current != 0 {
        tour.push(current);
        let prev = parent[mask * n + current] as usize;
        mask &= !(1 << (current - 1));
        current = prev;
    }
    tour.push(0);
    tour.reverse();

    Ok((tour, best_cost))
}

pub struct DynamicProgramming {
    graph: Graph,
    best: Solution,
    elapsed: Duration,
}

impl DynamicProgramming {
    /// Fails with [`TspError::TooLarge`] above [`MAX_VERTICES`].
    pub fn new(graph: Graph) -> Result<Self> {
        if graph.len() > MAX_VERTICES {
            return Err(TspError::TooLarge { method: "held-karp", limit: MAX_VERTICES, size: graph.len() });
        }
        Ok(DynamicProgramming { graph, best: Solution::new(), elapsed: Duration::ZERO })
    }
}

impl Solver for DynamicProgramming {
    fn name(&self) -> &str {
        "DynamicProgramming"
    }

    fn run(&mut self) -> Solution {
        let start = Instant::now();
        let mut solution = match held_karp(&self.graph) {
            Ok((tour, _)) => {
                let mut s = Solution::from_tour(&self.graph, tour, self.name());
                s.termination = Termination::Optimal;
                s
            }
            // Size is checked in `new`.
            Err(_) => Solution::unresolved(self.name()),
        };
        self.elapsed = start.elapsed();
        solution.computation_time = self.elapsed.as_secs_f64();
        solution.iterations = Some(1);
        info!("[DP] cost {:.3} in {:.3}s", solution.cost, self.elapsed.as_secs_f64());

        self.best = solution;
        self.best.clone()
    }

    fn best(&self) -> &Solution {
        &self.best
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::unit_square;
    use crate::solution::is_permutation;

    fn brute_force(graph: &Graph) -> f64 {
        fn permute(rest: &mut Vec<usize>, k: usize, graph: &Graph, best: &mut f64) {
            if k == rest.len() {
                let mut tour = vec![0];
                tour.extend_from_slice(rest);
                *best = best.min(graph.tour_cost(&tour));
                return;
            }
            for i in k..rest.len() {
                rest.swap(k, i);
                permute(rest, k + 1, graph, best);
                rest.swap(k, i);
            }
        }
        let mut rest: Vec<usize> = (1..graph.len()).collect();
        let mut best = f64::INFINITY;
        permute(&mut rest, 0, graph, &mut best);
        best
    }

    #[test]
    fn test_unit_square() {
        let (tour, cost) = held_karp(&unit_square()).unwrap();
        assert!((cost - 4.0).abs() < 1e-12);
        assert_eq!(tour[0], 0);
        assert!(is_permutation(&tour, 4));
    }

    #[test]
    fn test_matches_brute_force() {
        for seed in 0..5 {
            let graph = Graph::random(7, seed).unwrap();
            let (tour, cost) = held_karp(&graph).unwrap();
            assert!(is_permutation(&tour, 7));
            assert!((graph.tour_cost(&tour) - cost).abs() < 1e-9);
            assert!((cost - brute_force(&graph)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_too_large() {
        let graph = Graph::random(MAX_VERTICES + 1, 1).unwrap();
        assert!(matches!(held_karp(&graph), Err(TspError::TooLarge { size: 21, .. })));
        assert!(DynamicProgramming::new(graph).is_err());
    }

    #[test]
    fn test_solver_surface() {
        let mut dp = DynamicProgramming::new(unit_square()).unwrap();
        let solution = dp.run();
        assert_eq!(solution.termination, Termination::Optimal);
        assert!((dp.best().cost - 4.0).abs() < 1e-12);
    }
}
