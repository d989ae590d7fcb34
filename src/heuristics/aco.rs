//! Ant System over the graph's pheromone field.
//!
//! Every iteration each ant builds a full tour by roulette sampling over the
//! unvisited vertices with weight `pheromone^alpha * (1/cost)^beta`. After all
//! ants are done, every edge evaporates by `1 - rho` and each ant then deposits
//! `deposit_weight * deposit / cost` on the directed edges of its own tour.
//!
//! The pheromone scalars live on the [`Graph`] this solver owns, so concurrent
//! runs must each get their own clone.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::graph::Graph;
use crate::heuristics::convergence::ConvergencePolicy;
use crate::solution::{is_permutation, Solution, Solver, Termination};

/// ACO configuration parameters
///
/// There is no [`Initializer`](crate::heuristics::construction::Initializer)
/// field: ants build every tour themselves from a uniformly random start
/// vertex, so there is no initial population to seed.
#[derive(Debug, Clone)]
pub struct ACOConfig {
    /// Number of ants
    pub num_ants: usize,
    /// Number of iterations
    pub max_iterations: usize,
    /// Pheromone importance (alpha)
    pub alpha: f64,
    /// Heuristic importance (beta)
    pub beta: f64,
    /// Evaporation rate (rho)
    pub rho: f64,
    /// Pheromone deposit factor (Q)
    pub deposit: f64,
    /// Multiplier on every ant's deposit
    pub deposit_weight: f64,
    /// Initial pheromone level
    pub initial_pheromone: f64,
    pub convergence: ConvergencePolicy,
    /// Time limit in seconds
    pub time_limit: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for ACOConfig {
    fn default() -> Self {
        ACOConfig {
            num_ants: 10,
            max_iterations: 100,
            alpha: 1.0,
            beta: 3.0,
            rho: 0.1,
            deposit: 1.0,
            deposit_weight: 2.0,
            initial_pheromone: 1.0,
            convergence: ConvergencePolicy::default(),
            time_limit: 60.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ant {
    pub tour: Vec<usize>,
    pub cost: f64,
}

/// Ant Colony Optimization solver
pub struct AntColonyOptimization {
    config: ACOConfig,
    graph: Graph,
    /// `(1 / cost)^beta`, row-major, zero on the diagonal.
    visibility: Vec<f64>,
    ants: Vec<Ant>,
    best: Solution,
    rng: ChaCha8Rng,
    iteration: usize,
    history: Vec<f64>,
    elapsed: Duration,
}

impl AntColonyOptimization {
    pub fn new(mut graph: Graph, config: ACOConfig) -> Self {
        let n = graph.len();
        graph.reset_pheromone(config.initial_pheromone);

        let mut visibility = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let dist = graph.cost(i, j);
                    let eta = if dist > 0.0 { 1.0 / dist } else { 1e6 };
                    visibility[i * n + j] = eta.powf(config.beta);
                }
            }
        }

        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        AntColonyOptimization {
            config,
            graph,
            visibility,
            ants: Vec::new(),
            best: Solution::new(),
            rng,
            iteration: 0,
            history: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Graph with the current pheromone field.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Ants of the last completed iteration.
    pub fn ants(&self) -> &[Ant] {
        &self.ants
    }

    /// Best cost after every iteration.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Sample the next vertex from `candidates` leaving `current`.
    fn select_next_node(&mut self, current: usize, candidates: &[usize]) -> usize {
        let n = self.graph.len();
        let weights: Vec<f64> = candidates
            .iter()
            .map(|&j| self.graph.pheromone(current, j).powf(self.config.alpha) * self.visibility[current * n + j])
            .collect();
        let total: f64 = weights.iter().sum();

        if !(total > 0.0 && total.is_finite()) {
            return candidates[self.rng.gen_range(0..candidates.len())];
        }

        let draw = self.rng.gen::<f64>();
        let mut cumulative = 0.0;
        for (&j, &w) in candidates.iter().zip(&weights) {
            cumulative += w / total;
            if cumulative >= draw {
                return j;
            }
        }
        // Rounding can leave the last cumulative value just below the draw.
        candidates[candidates.len() - 1]
    }

    /// Construct a solution for one ant
    fn construct_solution(&mut self) -> Vec<usize> {
        let n = self.graph.len();
        let first = self.rng.gen_range(0..n);
        let mut tour = Vec::with_capacity(n);
        tour.push(first);

        let mut unvisited: Vec<usize> = (0..n).filter(|&v| v != first).collect();
        let mut current = first;
        while !unvisited.is_empty() {
            let next = self.select_next_node(current, &unvisited);
            unvisited.retain(|&v| v != next);
            tour.push(next);
            current = next;
        }

        debug_assert!(is_permutation(&tour, n));
        tour
    }

    fn update_pheromone(&mut self) {
        self.graph.evaporate(self.config.rho);

        for ant in &self.ants {
            let amount = if ant.cost > 0.0 {
                self.config.deposit_weight * self.config.deposit / ant.cost
            } else {
                self.config.deposit_weight * self.config.deposit * 1e6
            };
            let m = ant.tour.len();
            if m < 2 {
                continue;
            }
            for i in 0..m {
                self.graph.deposit(ant.tour[i], ant.tour[(i + 1) % m], amount);
            }
        }
    }

    /// One iteration: all ants build, evaporate, all ants deposit.
    pub fn step(&mut self) {
        let mut ants = Vec::with_capacity(self.config.num_ants);
        for _ in 0..self.config.num_ants.max(1) {
            let tour = self.construct_solution();
            let cost = self.graph.tour_cost(&tour);
            ants.push(Ant { tour, cost });
        }

        for ant in &ants {
            if ant.cost < self.best.cost {
                self.best.tour.clone_from(&ant.tour);
                self.best.cost = ant.cost;
            }
        }

        self.ants = ants;
        self.update_pheromone();
        self.history.push(self.best.cost);
        self.iteration += 1;
    }
}

impl Solver for AntColonyOptimization {
    fn name(&self) -> &str {
        "ACO"
    }

    fn run(&mut self) -> Solution {
        let start = Instant::now();
        let max_iterations = self.config.max_iterations;
        info!(
            "[ACO] {} ants, {} iterations, alpha {} beta {} rho {}",
            self.config.num_ants, max_iterations, self.config.alpha, self.config.beta, self.config.rho
        );

        let mut termination = Termination::IterationLimit;
        while self.iteration < max_iterations {
            if start.elapsed().as_secs_f64() >= self.config.time_limit {
                termination = Termination::TimeLimit;
                break;
            }

            let index = self.iteration;
            self.step();
            debug!("[ACO] Iter {}  Best cost {:.3}", self.iteration, self.best.cost);

            let costs: Vec<f64> = self.ants.iter().map(|a| a.cost).collect();
            if self.config.convergence.should_stop(index, max_iterations, &costs) {
                termination = Termination::Converged;
                break;
            }
        }

        if self.best.tour.is_empty() {
            // No iteration ran; report a plain identity tour rather than nothing.
            self.best.tour = self.graph.vertex_indices().collect();
        }

        self.elapsed = start.elapsed();
        self.best.algorithm = self.name().to_string();
        self.best.validate(&self.graph);
        self.best.termination = termination;
        self.best.iterations = Some(self.iteration);
        self.best.computation_time = self.elapsed.as_secs_f64();

        if termination.timed_out() {
            warn!("[ACO] time limit reached at iteration {}", self.iteration);
        }
        info!(
            "[ACO] finished after {} iterations ({}): best cost {:.3}, {:.3}s",
            self.iteration,
            termination,
            self.best.cost,
            self.elapsed.as_secs_f64()
        );

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

    fn quick_config() -> ACOConfig {
        ACOConfig {
            num_ants: 8,
            max_iterations: 30,
            time_limit: 30.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_ant_tours_are_permutations() {
        let graph = Graph::random(12, 3).unwrap();
        let mut aco = AntColonyOptimization::new(graph, quick_config());
        aco.step();

        assert_eq!(aco.ants().len(), 8);
        for ant in aco.ants() {
            assert!(is_permutation(&ant.tour, 12));
            assert!((aco.graph().tour_cost(&ant.tour) - ant.cost).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pheromone_reset_on_construction() {
        let graph = Graph::random(6, 1).unwrap();
        let config = ACOConfig { initial_pheromone: 0.5, ..quick_config() };
        let aco = AntColonyOptimization::new(graph, config);
        assert!(aco.graph().edges().all(|e| e.pheromone == 0.5));
    }

    #[test]
    fn test_pheromone_update_is_directed() {
        let graph = unit_square();
        let config = ACOConfig { num_ants: 1, ..quick_config() };
        let mut aco = AntColonyOptimization::new(graph, config);
        aco.step();

        let ant = aco.ants()[0].clone();
        let amount = 2.0 / ant.cost;
        let n = ant.tour.len();
        let on_tour = |u: usize, v: usize| (0..n).any(|i| ant.tour[i] == u && ant.tour[(i + 1) % n] == v);

        for edge in aco.graph().edges() {
            let expected = if on_tour(edge.origin, edge.destination) { 0.9 + amount } else { 0.9 };
            assert!((edge.pheromone - expected).abs() < 1e-12, "{edge:?}");
        }
    }

    #[test]
    fn test_best_cost_never_regresses() {
        let graph = Graph::random(15, 5).unwrap();
        let config = ACOConfig { convergence: ConvergencePolicy::disabled(), ..quick_config() };
        let mut aco = AntColonyOptimization::new(graph.clone(), config);
        let solution = aco.run();

        assert_eq!(solution.termination, Termination::IterationLimit);
        assert_eq!(aco.history().len(), 30);
        assert!(aco.history().windows(2).all(|w| w[1] <= w[0]));
        assert!(solution.is_permutation(15));
        assert!((graph.tour_cost(&solution.tour) - solution.cost).abs() < 1e-9);
    }

    #[test]
    fn test_sampling_follows_heavy_pheromone() {
        let config = ACOConfig { initial_pheromone: 1e-9, ..quick_config() };
        let mut aco = AntColonyOptimization::new(unit_square(), config);
        aco.graph.deposit(0, 3, 1e9);

        for _ in 0..20 {
            assert_eq!(aco.select_next_node(0, &[1, 2, 3]), 3);
        }
    }

    #[test]
    fn test_zero_budget_is_time_limit() {
        let graph = Graph::random(10, 2).unwrap();
        let config = ACOConfig { time_limit: 0.0, ..quick_config() };
        let mut aco = AntColonyOptimization::new(graph, config);
        let solution = aco.run();

        assert_eq!(solution.termination, Termination::TimeLimit);
        assert!(solution.is_permutation(10));
    }

    #[test]
    fn test_unit_square_reaches_perimeter() {
        let mut aco = AntColonyOptimization::new(unit_square(), quick_config());
        let solution = aco.run();
        assert!((solution.cost - 4.0).abs() < 1e-9);
    }

    /// Every tour costs the same, so the population collapses immediately.
    fn flat_graph(n: usize) -> Graph {
        Graph::from_cost_matrix(&vec![vec![1.0; n]; n]).unwrap()
    }

    #[test]
    fn test_collapsed_colony_stops_at_first_check() {
        let config = ACOConfig { max_iterations: 50, ..quick_config() };
        let first = config.convergence.first_checked_iteration(50);
        let mut aco = AntColonyOptimization::new(flat_graph(6), config);
        let solution = aco.run();

        assert_eq!(solution.termination, Termination::Converged);
        assert_eq!(solution.iterations, Some(first + 1));
        assert!(solution.is_permutation(6));
    }

    #[test]
    fn test_disabled_convergence_runs_every_iteration() {
        let config = ACOConfig { max_iterations: 30, convergence: ConvergencePolicy::disabled(), ..quick_config() };
        let mut aco = AntColonyOptimization::new(flat_graph(6), config);
        let solution = aco.run();

        assert_eq!(solution.termination, Termination::IterationLimit);
        assert_eq!(solution.iterations, Some(30));
    }
}
