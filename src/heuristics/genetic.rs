//! Genetic algorithm over tour permutations.
//!
//! Each generation:
//! - truncation selection fills a mating pool with the best half of the population
//! - crossover clones one parent and splices in a sub-sequence of the other at
//!   its cheapest insertion point
//! - swap mutation hits each child with a fixed probability
//! - elitist replacement keeps the best `population_size` of parents and children

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::graph::Graph;
use crate::heuristics::construction::Initializer;
use crate::heuristics::convergence::ConvergencePolicy;
use crate::solution::{is_permutation, Solution, Solver, Termination};

/// Individual in the genetic algorithm population
#[derive(Debug, Clone)]
pub struct Individual {
    /// Tour as vertex positions
    pub genes: Vec<usize>,
    pub cost: f64,
    pub id: u64,
}

impl Individual {
    pub fn new(genes: Vec<usize>, graph: &Graph, id: u64) -> Self {
        let cost = graph.tour_cost(&genes);
        Individual { genes, cost, id }
    }

    /// Random contiguous slice `genes[start..end]` of length 2..=n-2.
    ///
    /// Requires at least 4 genes, otherwise no valid slice exists.
    pub fn random_sub_solution(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let n = self.genes.len();
        debug_assert!(n >= 4);

        let start = rng.gen_range(0..n);
        let mut end = start;
        while end == start || end.abs_diff(start) == 1 || end.abs_diff(start) == n - 1 {
            end = rng.gen_range(0..n);
        }
        let (start, end) = if start > end { (end, start) } else { (start, end) };
        self.genes[start..end].to_vec()
    }

    pub fn remove_vertices(&mut self, sub_solution: &[usize]) {
        self.genes.retain(|gene| !sub_solution.contains(gene));
    }

    /// Insert after position `after`, or append when `None`.
    pub fn insert_sub_solution(&mut self, sub_solution: &[usize], after: Option<usize>) {
        match after {
            Some(pos) => {
                let tail = self.genes.split_off(pos + 1);
                self.genes.extend_from_slice(sub_solution);
                self.genes.extend(tail);
            }
            None => self.genes.extend_from_slice(sub_solution),
        }
    }

    /// Swap two distinct random positions.
    pub fn mutate(&mut self, rng: &mut ChaCha8Rng) {
        let n = self.genes.len();
        if n < 2 {
            return;
        }
        let i = rng.gen_range(0..n);
        let mut j = rng.gen_range(0..n);
        while i == j {
            j = rng.gen_range(0..n);
        }
        self.genes.swap(i, j);
    }
}

/// Where to splice `sub_solution` back into `genes`.
///
/// Maximizes the saving `c(g[i], g[i+1]) - c(g[i], first) - c(last, g[i+1])` over
/// consecutive pairs; the closing position (append at end) only wins if strictly
/// better. Returns `None` for the closing position.
pub fn best_insertion(graph: &Graph, genes: &[usize], sub_solution: &[usize]) -> Option<usize> {
    let (first, last) = match (sub_solution.first(), sub_solution.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return None,
    };
    let m = genes.len();
    if m == 0 {
        return None;
    }

    let saving = |u: usize, v: usize| graph.cost(u, v) - graph.cost(u, first) - graph.cost(last, v);

    let mut best_pos = None;
    let mut best_saving = f64::NEG_INFINITY;
    for i in 0..m.saturating_sub(1) {
        let s = saving(genes[i], genes[i + 1]);
        if s > best_saving {
            best_saving = s;
            best_pos = Some(i);
        }
    }

    if m >= 2 && saving(genes[m - 1], genes[0]) > best_saving {
        best_pos = None;
    }
    best_pos
}

/// Genetic Algorithm configuration
#[derive(Debug, Clone)]
pub struct GAConfig {
    /// Population size
    pub population_size: usize,
    /// Number of generations
    pub max_generations: usize,
    /// Probability that a child gets one swap mutation
    pub mutation_probability: f64,
    pub initializer: Initializer,
    pub convergence: ConvergencePolicy,
    /// Time limit in seconds
    pub time_limit: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for GAConfig {
    fn default() -> Self {
        GAConfig {
            population_size: 50,
            max_generations: 200,
            mutation_probability: 0.1,
            initializer: Initializer::Random,
            convergence: ConvergencePolicy::default(),
            time_limit: 60.0,
            seed: 42,
        }
    }
}

/// Genetic Algorithm implementation
pub struct GeneticAlgorithm {
    config: GAConfig,
    graph: Graph,
    population: Vec<Individual>,
    best: Solution,
    rng: ChaCha8Rng,
    generation: usize,
    next_id: u64,
    history: Vec<f64>,
    elapsed: Duration,
}

impl GeneticAlgorithm {
    pub fn new(graph: Graph, config: GAConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let tours = config
            .initializer
            .construct_initial_population(&graph, config.population_size.max(1), &mut rng);

        let population: Vec<Individual> = tours
            .into_iter()
            .enumerate()
            .map(|(idx, genes)| Individual::new(genes, &graph, idx as u64 + 1))
            .collect();
        let next_id = population.len() as u64 + 1;

        let mut ga = GeneticAlgorithm {
            config,
            graph,
            population,
            best: Solution::new(),
            rng,
            generation: 0,
            next_id,
            history: Vec::new(),
            elapsed: Duration::ZERO,
        };
        ga.population.sort_by_key(|ind| OrderedFloat(ind.cost));
        ga.update_best();
        ga
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Best cost after initialization and after every generation.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Best half of the population by cost, ties in population order.
    fn selection(&self) -> Vec<Individual> {
        let pool_size = (self.config.population_size / 2).max(1);
        let mut ranked: Vec<&Individual> = self.population.iter().collect();
        ranked.sort_by_key(|ind| OrderedFloat(ind.cost));
        ranked.into_iter().take(pool_size).cloned().collect()
    }

    fn cross_over(&mut self, mating_pool: &[Individual]) -> Vec<Individual> {
        let n = self.graph.len();
        let count = self.config.population_size / 2;
        let mut children = Vec::with_capacity(count);

        for _ in 0..count {
            let (Some(parent1), Some(parent2)) = (mating_pool.choose(&mut self.rng), mating_pool.choose(&mut self.rng))
            else {
                break;
            };

            let mut child = parent1.clone();
            child.id = self.next_id();

            if n >= 4 {
                let sub_solution = parent2.random_sub_solution(&mut self.rng);
                child.remove_vertices(&sub_solution);
                let after = best_insertion(&self.graph, &child.genes, &sub_solution);
                child.insert_sub_solution(&sub_solution, after);
                child.cost = self.graph.tour_cost(&child.genes);
            }

            debug_assert!(is_permutation(&child.genes, n));
            children.push(child);
        }

        children
    }

    fn mutation(&mut self, children: &mut [Individual]) {
        for child in children.iter_mut() {
            if self.rng.gen::<f64>() < self.config.mutation_probability {
                child.mutate(&mut self.rng);
                child.cost = self.graph.tour_cost(&child.genes);
                debug_assert!(is_permutation(&child.genes, self.graph.len()));
            }
        }
    }

    /// Merge and keep the cheapest `population_size`; parents win ties.
    fn substitution(&mut self, children: Vec<Individual>) {
        self.population.extend(children);
        self.population.sort_by_key(|ind| OrderedFloat(ind.cost));
        self.population.truncate(self.config.population_size.max(1));
    }

    fn update_best(&mut self) {
        if let Some(top) = self.population.iter().min_by_key(|ind| OrderedFloat(ind.cost)) {
            if top.cost < self.best.cost {
                self.best.tour.clone_from(&top.genes);
                self.best.cost = top.cost;
            }
        }
        self.history.push(self.best.cost);
    }

    fn costs(&self) -> Vec<f64> {
        self.population.iter().map(|ind| ind.cost).collect()
    }

    /// One full generation: select, cross over, mutate, replace.
    pub fn evolve(&mut self) {
        let mating_pool = self.selection();
        let mut children = self.cross_over(&mating_pool);
        self.mutation(&mut children);
        self.substitution(children);
        self.update_best();
        self.generation += 1;
    }
}

impl Solver for GeneticAlgorithm {
    fn name(&self) -> &str {
        "GeneticAlgorithm"
    }

    fn run(&mut self) -> Solution {
        let start = Instant::now();
        let max_generations = self.config.max_generations;
        info!(
            "[GA] population {} ({}), {} generations, initial best {:.3}",
            self.population.len(),
            self.config.initializer,
            max_generations,
            self.best.cost
        );

        let mut termination = Termination::IterationLimit;
        while self.generation < max_generations {
            if start.elapsed().as_secs_f64() >= self.config.time_limit {
                termination = Termination::TimeLimit;
                break;
            }

            let index = self.generation;
            self.evolve();
            debug!("[GA] Gen {}  Best cost {:.3}", self.generation, self.best.cost);

            if self.config.convergence.should_stop(index, max_generations, &self.costs()) {
                termination = Termination::Converged;
                break;
            }
        }

        self.elapsed = start.elapsed();
        self.best.algorithm = self.name().to_string();
        self.best.validate(&self.graph);
        self.best.termination = termination;
        self.best.iterations = Some(self.generation);
        self.best.computation_time = self.elapsed.as_secs_f64();

        if termination.timed_out() {
            warn!("[GA] time limit reached at generation {}", self.generation);
        }
        info!(
            "[GA] finished after {} generations ({}): best cost {:.3}, {:.3}s",
            self.generation,
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
