//! Discrete particle swarm over tour permutations.
//!
//! A particle's velocity is a list of position swaps. Each iteration derives the
//! swaps that would turn the particle's tour into its personal best (applied
//! with probability `alpha` each) and into the swarm's global best (probability
//! `beta` each), then applies them in that order.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::graph::Graph;
use crate::heuristics::construction::Initializer;
use crate::heuristics::convergence::ConvergencePolicy;
use crate::solution::{is_permutation, Solution, Solver, Termination};

/// Position swap `(i, j)` applied with probability `weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swap {
    pub i: usize,
    pub j: usize,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub tour: Vec<usize>,
    pub cost: f64,
    pub best_tour: Vec<usize>,
    pub best_cost: f64,
    /// Swaps derived in the last iteration.
    pub velocity: Vec<Swap>,
}

impl Particle {
    pub fn new(tour: Vec<usize>, graph: &Graph) -> Self {
        let cost = graph.tour_cost(&tour);
        Particle {
            best_tour: tour.clone(),
            best_cost: cost,
            tour,
            cost,
            velocity: Vec::new(),
        }
    }
}

/// Swaps that turn `from` into `target` when applied in order.
///
/// Works on a private copy of `from`; neither input is modified.
pub fn swap_sequence(from: &[usize], target: &[usize], weight: f64) -> Vec<Swap> {
    let mut scratch = from.to_vec();
    let mut position = vec![0; scratch.len()];
    for (pos, &v) in scratch.iter().enumerate() {
        position[v] = pos;
    }

    let mut swaps = Vec::new();
    for i in 0..scratch.len() {
        if scratch[i] != target[i] {
            let j = position[target[i]];
            position[scratch[i]] = j;
            position[scratch[j]] = i;
            scratch.swap(i, j);
            swaps.push(Swap { i, j, weight });
        }
    }
    swaps
}

#[derive(Debug, Clone)]
pub struct PSOConfig {
    pub num_particles: usize,
    pub max_iterations: usize,
    /// Probability of applying each swap toward the personal best.
    pub alpha: f64,
    /// Probability of applying each swap toward the global best.
    pub beta: f64,
    pub initializer: Initializer,
    pub convergence: ConvergencePolicy,
    /// Time limit in seconds
    pub time_limit: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for PSOConfig {
    fn default() -> Self {
        PSOConfig {
            num_particles: 10,
            max_iterations: 100,
            alpha: 0.9,
            beta: 1.0,
            initializer: Initializer::Random,
            convergence: ConvergencePolicy::default(),
            time_limit: 60.0,
            seed: 42,
        }
    }
}

pub struct ParticleSwarmOptimization {
    config: PSOConfig,
    graph: Graph,
    particles: Vec<Particle>,
    best: Solution,
    rng: ChaCha8Rng,
    iteration: usize,
    history: Vec<f64>,
    elapsed: Duration,
}

impl ParticleSwarmOptimization {
    pub fn new(graph: Graph, config: PSOConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let particles: Vec<Particle> = config
            .initializer
            .construct_initial_population(&graph, config.num_particles.max(1), &mut rng)
            .into_iter()
            .map(|tour| Particle::new(tour, &graph))
            .collect();

        let mut pso = ParticleSwarmOptimization {
            config,
            graph,
            particles,
            best: Solution::new(),
            rng,
            iteration: 0,
            history: Vec::new(),
            elapsed: Duration::ZERO,
        };
        pso.update_global_best();
        pso
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Global best cost after initialization and after every iteration.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    fn update_global_best(&mut self) {
        if let Some(leader) = self.particles.iter().min_by_key(|p| OrderedFloat(p.best_cost)) {
            if leader.best_cost < self.best.cost {
                self.best.tour.clone_from(&leader.best_tour);
                self.best.cost = leader.best_cost;
            }
        }
        self.history.push(self.best.cost);
    }

    /// Move every particle once, then refresh the global best.
    pub fn step(&mut self) {
        let n = self.graph.len();
        let global_best = self.best.tour.clone();

        for particle in self.particles.iter_mut() {
            let mut velocity = swap_sequence(&particle.tour, &particle.best_tour, self.config.alpha);
            velocity.extend(swap_sequence(&particle.tour, &global_best, self.config.beta));

            for swap in &velocity {
                if self.rng.gen::<f64>() < swap.weight {
                    particle.tour.swap(swap.i, swap.j);
                }
            }
            debug_assert!(is_permutation(&particle.tour, n));

            particle.velocity = velocity;
            particle.cost = self.graph.tour_cost(&particle.tour);
            if particle.cost < particle.best_cost {
                particle.best_cost = particle.cost;
                particle.best_tour.clone_from(&particle.tour);
            }
        }

        self.update_global_best();
        self.iteration += 1;
    }
}

impl Solver for ParticleSwarmOptimization {
    fn name(&self) -> &str {
        "PSO"
    }

    fn run(&mut self) -> Solution {
        let start = Instant::now();
        let max_iterations = self.config.max_iterations;
        info!(
            "[PSO] {} particles ({}), {} iterations, initial best {:.3}",
            self.particles.len(),
            self.config.initializer,
            max_iterations,
            self.best.cost
        );

        let mut termination = Termination::IterationLimit;
        while self.iteration < max_iterations {
            if start.elapsed().as_secs_f64() >= self.config.time_limit {
                termination = Termination::TimeLimit;
                break;
            }

            let index = self.iteration;
            self.step();
            debug!("[PSO] Iter {}  Best cost {:.3}", self.iteration, self.best.cost);

            let costs: Vec<f64> = self.particles.iter().map(|p| p.cost).collect();
            if self.config.convergence.should_stop(index, max_iterations, &costs) {
                termination = Termination::Converged;
                break;
            }
        }

        self.elapsed = start.elapsed();
        self.best.algorithm = self.name().to_string();
        self.best.validate(&self.graph);
        self.best.termination = termination;
        self.best.iterations = Some(self.iteration);
        self.best.computation_time = self.elapsed.as_secs_f64();

        if termination.timed_out() {
            warn!("[PSO] time limit reached at iteration {}", self.iteration);
        }
        info!(
            "[PSO] finished after {} iterations ({}): best cost {:.3}, {:.3}s",
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
