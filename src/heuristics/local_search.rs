//! Single-tour local search: 2-opt and 3-opt, plain and annealed.
//!
//! Plain 2-opt scans pairs `(i, j)` in a fixed order, applies the first strictly
//! improving reversal and restarts the scan. Plain 3-opt sweeps all triples and,
//! per triple, applies the best strictly improving reconnection. Both stop at a
//! local optimum or when the time budget runs out; the budget is only checked
//! between scans, so a single sweep is never interrupted.
//!
//! The annealed variants sweep the same neighborhoods but may also accept a
//! worsening move while the temperature is high. Temperature starts at 1 and
//! drops by a fixed step after every sweep; the run ends once it goes negative.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::graph::Graph;
use crate::heuristics::construction::Initializer;
use crate::solution::{is_permutation, Solution, Solver, Termination};

/// Minimum gain for a move to count as strictly improving.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    TwoOpt,
    ThreeOpt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealingSchedule {
    pub initial_temperature: f64,
    /// Subtracted from the temperature after each full sweep.
    pub cooling_step: f64,
}

impl AnnealingSchedule {
    pub fn for_two_opt() -> Self {
        AnnealingSchedule { initial_temperature: 1.0, cooling_step: 0.33 }
    }

    pub fn for_three_opt() -> Self {
        AnnealingSchedule { initial_temperature: 1.0, cooling_step: 0.1 }
    }
}

#[derive(Debug, Clone)]
pub struct LocalSearchConfig {
    pub neighborhood: Neighborhood,
    /// `None` for pure descent.
    pub annealing: Option<AnnealingSchedule>,
    pub initializer: Initializer,
    /// Time limit in seconds
    pub time_limit: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        LocalSearchConfig {
            neighborhood: Neighborhood::TwoOpt,
            annealing: None,
            initializer: Initializer::Random,
            time_limit: 60.0,
            seed: 42,
        }
    }
}

impl LocalSearchConfig {
    pub fn two_opt() -> Self {
        Self::default()
    }

    pub fn three_opt() -> Self {
        LocalSearchConfig { neighborhood: Neighborhood::ThreeOpt, ..Self::default() }
    }

    pub fn annealed_two_opt() -> Self {
        LocalSearchConfig { annealing: Some(AnnealingSchedule::for_two_opt()), ..Self::default() }
    }

    pub fn annealed_three_opt() -> Self {
        LocalSearchConfig {
            neighborhood: Neighborhood::ThreeOpt,
            annealing: Some(AnnealingSchedule::for_three_opt()),
            ..Self::default()
        }
    }
}

/// Tour rearrangement, expressed on positions `i < j < k <= n`.
///
/// A 3-opt sweep on fewer than five vertices uses `ReverseFirst` with `k == j`.
///
/// With `a = t[i-1], b = t[i], c = t[j-1], d = t[j], e = t[k-1], f = t[k mod n]`:
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Reverse `[i, j)`: edges (a,b),(c,d) become (a,c),(b,d).
    TwoOpt { i: usize, j: usize },
    /// Reverse `[i, j)` inside a triple.
    ReverseFirst { i: usize, j: usize, k: usize },
    /// Reverse `[j, k)`.
    ReverseSecond { i: usize, j: usize, k: usize },
    /// Reverse the whole `[i, k)`.
    ReverseBoth { i: usize, j: usize, k: usize },
    /// Replace `[i, k)` by `[j, k)` followed by `[i, j)`.
    SwapSegments { i: usize, j: usize, k: usize },
}

impl Move {
    pub fn apply(&self, tour: &mut [usize]) {
        match *self {
            Move::TwoOpt { i, j } | Move::ReverseFirst { i, j, .. } => tour[i..j].reverse(),
            Move::ReverseSecond { j, k, .. } => tour[j..k].reverse(),
            Move::ReverseBoth { i, k, .. } => tour[i..k].reverse(),
            Move::SwapSegments { i, j, k } => tour[i..k].rotate_left(j - i),
        }
    }
}

/// Cost change of reversing `[i, j)`; negative is an improvement.
pub fn two_opt_delta(graph: &Graph, tour: &[usize], i: usize, j: usize) -> f64 {
    let n = tour.len();
    let a = tour[(i + n - 1) % n];
    let b = tour[i];
    let c = tour[j - 1];
    let d = tour[j % n];

    let removed = graph.cost(a, b) + graph.cost(c, d);
    let added = graph.cost(a, c) + graph.cost(b, d);
    added - removed
}

/// The four 3-opt reconnections of triple `(i, j, k)` with their cost changes,
/// in evaluation order: reverse first, reverse second, reverse both, swap.
pub fn three_opt_candidates(graph: &Graph, tour: &[usize], i: usize, j: usize, k: usize) -> [(Move, f64); 4] {
    let n = tour.len();
    let a = tour[(i + n - 1) % n];
    let b = tour[i];
    let c = tour[j - 1];
    let d = tour[j];
    let e = tour[k - 1];
    let f = tour[k % n];

    let d0 = graph.cost(a, b) + graph.cost(c, d) + graph.cost(e, f);
    let reverse_first = graph.cost(a, c) + graph.cost(b, d) + graph.cost(e, f);
    let reverse_second = graph.cost(a, b) + graph.cost(c, e) + graph.cost(d, f);
    let reverse_both = graph.cost(f, b) + graph.cost(c, d) + graph.cost(e, a);
    let swap = graph.cost(a, d) + graph.cost(e, b) + graph.cost(c, f);

    [
        (Move::ReverseFirst { i, j, k }, reverse_first - d0),
        (Move::ReverseSecond { i, j, k }, reverse_second - d0),
        (Move::ReverseBoth { i, j, k }, reverse_both - d0),
        (Move::SwapSegments { i, j, k }, swap - d0),
    ]
}

fn two_opt_pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (i + 2..n).map(move |j| (i, j)))
}

fn three_opt_triples(n: usize) -> impl Iterator<Item = (usize, usize, usize)> {
    (0..n).flat_map(move |i| {
        (i + 2..n).flat_map(move |j| {
            let end = n + usize::from(i > 0);
            (j + 2..end).map(move |k| (i, j, k))
        })
    })
}

/// Cut points swept by 3-opt. Below five vertices no proper triple exists and
/// the sweep degenerates to single reversals `(i, j, j)` over the 2-opt pairs.
fn three_opt_cuts(n: usize) -> impl Iterator<Item = (usize, usize, usize)> {
    let degenerate = if n < 5 { n } else { 0 };
    three_opt_triples(n).chain(two_opt_pairs(degenerate).map(|(i, j)| (i, j, j)))
}

/// Reconnections of one cut; only the first `len` entries are meaningful.
fn reconnections(graph: &Graph, tour: &[usize], (i, j, k): (usize, usize, usize)) -> ([(Move, f64); 4], usize) {
    if k == j {
        let reverse = (Move::ReverseFirst { i, j, k }, two_opt_delta(graph, tour, i, j));
        ([reverse; 4], 1)
    } else {
        (three_opt_candidates(graph, tour, i, j, k), 4)
    }
}

/// 2-opt / 3-opt solver, optionally annealed.
pub struct LocalSearchSolver {
    config: LocalSearchConfig,
    graph: Graph,
    tour: Vec<usize>,
    cost: f64,
    initial_cost: f64,
    best: Solution,
    rng: ChaCha8Rng,
    improving_moves: usize,
    worsening_moves: usize,
    elapsed: Duration,
}

impl LocalSearchSolver {
    pub fn new(graph: Graph, config: LocalSearchConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let tour = config
            .initializer
            .construct_initial_population(&graph, 1, &mut rng)
            .pop()
            .unwrap_or_default();
        Self::build(graph, tour, config, rng)
    }

    /// Start from an explicit tour instead of the configured initializer.
    ///
    /// # Panics
    /// If `tour` is not a permutation of the graph's vertices.
    pub fn with_tour(graph: Graph, tour: Vec<usize>, config: LocalSearchConfig) -> Self {
        assert!(is_permutation(&tour, graph.len()), "initial tour must visit every vertex once");
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::build(graph, tour, config, rng)
    }

    fn build(graph: Graph, tour: Vec<usize>, config: LocalSearchConfig, rng: ChaCha8Rng) -> Self {
        let cost = graph.tour_cost(&tour);
        let mut solver = LocalSearchSolver {
            config,
            graph,
            tour,
            cost,
            initial_cost: cost,
            best: Solution::new(),
            rng,
            improving_moves: 0,
            worsening_moves: 0,
            elapsed: Duration::ZERO,
        };
        solver.best = Solution::from_tour(&solver.graph, solver.tour.clone(), solver.label());
        solver
    }

    fn label(&self) -> &'static str {
        match (self.config.neighborhood, self.config.annealing.is_some()) {
            (Neighborhood::TwoOpt, false) => "2-Opt",
            (Neighborhood::ThreeOpt, false) => "3-Opt",
            (Neighborhood::TwoOpt, true) => "SA-2-Opt",
            (Neighborhood::ThreeOpt, true) => "SA-3-Opt",
        }
    }

    pub fn initial_cost(&self) -> f64 {
        self.initial_cost
    }

    /// Accepted moves that lowered the cost.
    pub fn improving_moves(&self) -> usize {
        self.improving_moves
    }

    /// Accepted non-improving moves (annealed variants only).
    pub fn worsening_moves(&self) -> usize {
        self.worsening_moves
    }

    fn apply(&mut self, mv: Move, delta: f64) {
        mv.apply(&mut self.tour);
        self.cost += delta;
        if delta < -EPSILON {
            self.improving_moves += 1;
        } else {
            self.worsening_moves += 1;
        }
        if self.cost < self.best.cost - EPSILON {
            self.best.tour.clone_from(&self.tour);
            self.best.cost = self.cost;
        }
    }

    /// First strictly improving 2-opt move in scan order.
    fn find_improving_two_opt(&self) -> Option<(Move, f64)> {
        two_opt_pairs(self.tour.len())
            .map(|(i, j)| (Move::TwoOpt { i, j }, two_opt_delta(&self.graph, &self.tour, i, j)))
            .find(|&(_, delta)| delta < -EPSILON)
    }

    /// Best strictly improving reconnection of a triple; earlier candidates win ties.
    fn best_improving(candidates: &[(Move, f64)]) -> Option<(Move, f64)> {
        let mut best: Option<(Move, f64)> = None;
        for &(mv, delta) in candidates {
            if delta < -EPSILON && best.map_or(true, |(_, b)| delta < b) {
                best = Some((mv, delta));
            }
        }
        best
    }

    fn descend_two_opt(&mut self, start: &Instant) -> (Termination, usize) {
        let mut scans = 0;
        loop {
            if start.elapsed().as_secs_f64() >= self.config.time_limit {
                return (Termination::TimeLimit, scans);
            }
            scans += 1;
            match self.find_improving_two_opt() {
                Some((mv, delta)) => self.apply(mv, delta),
                None => return (Termination::LocalOptimum, scans),
            }
        }
    }

    fn descend_three_opt(&mut self, start: &Instant) -> (Termination, usize) {
        let n = self.tour.len();
        let mut sweeps = 0;
        loop {
            if start.elapsed().as_secs_f64() >= self.config.time_limit {
                return (Termination::TimeLimit, sweeps);
            }
            sweeps += 1;
            let mut improved = false;
            for cut in three_opt_cuts(n) {
                let (candidates, len) = reconnections(&self.graph, &self.tour, cut);
                if let Some((mv, delta)) = Self::best_improving(&candidates[..len]) {
                    self.apply(mv, delta);
                    improved = true;
                }
            }
            debug!("[{}] sweep {} cost {:.3}", self.label(), sweeps, self.cost);
            if !improved {
                return (Termination::LocalOptimum, sweeps);
            }
        }
    }

    fn anneal(&mut self, schedule: AnnealingSchedule, start: &Instant) -> (Termination, usize) {
        let n = self.tour.len();
        let mut temperature = schedule.initial_temperature;
        let mut sweeps = 0;

        while temperature >= 0.0 {
            if start.elapsed().as_secs_f64() >= self.config.time_limit {
                return (Termination::TimeLimit, sweeps);
            }
            sweeps += 1;

            match self.config.neighborhood {
                Neighborhood::TwoOpt => {
                    for (i, j) in two_opt_pairs(n) {
                        let delta = two_opt_delta(&self.graph, &self.tour, i, j);
                        let removed = self.removed_two_opt(i, j);
                        let hot = self.rng.gen::<f64>() <= temperature;
                        if delta < -EPSILON || (hot && removed * (1.0 + temperature) > removed + delta) {
                            self.apply(Move::TwoOpt { i, j }, delta);
                        }
                    }
                }
                Neighborhood::ThreeOpt => {
                    for cut in three_opt_cuts(n) {
                        let (candidates, len) = reconnections(&self.graph, &self.tour, cut);
                        let hot = self.rng.gen::<f64>() <= temperature;
                        if let Some((mv, delta)) = Self::best_improving(&candidates[..len]) {
                            self.apply(mv, delta);
                        } else if hot {
                            let (i, j, k) = cut;
                            let removed = if k == j {
                                self.removed_two_opt(i, j)
                            } else {
                                self.removed_three_opt(i, j, k)
                            };
                            let accepted = candidates[..len]
                                .iter()
                                .find(|&&(_, delta)| removed * (1.0 + temperature) > removed + delta);
                            if let Some(&(mv, delta)) = accepted {
                                self.apply(mv, delta);
                            }
                        }
                    }
                }
            }

            debug!(
                "[{}] sweep {} temperature {:.2} cost {:.3}",
                self.label(),
                sweeps,
                temperature,
                self.cost
            );
            temperature -= schedule.cooling_step;
        }

        (Termination::Frozen, sweeps)
    }

    fn removed_two_opt(&self, i: usize, j: usize) -> f64 {
        let n = self.tour.len();
        let t = &self.tour;
        self.graph.cost(t[(i + n - 1) % n], t[i]) + self.graph.cost(t[j - 1], t[j % n])
    }

    fn removed_three_opt(&self, i: usize, j: usize, k: usize) -> f64 {
        let n = self.tour.len();
        let t = &self.tour;
        self.graph.cost(t[(i + n - 1) % n], t[i])
            + self.graph.cost(t[j - 1], t[j])
            + self.graph.cost(t[k - 1], t[k % n])
    }
}

impl Solver for LocalSearchSolver {
    fn name(&self) -> &str {
        self.label()
    }

    fn run(&mut self) -> Solution {
        let start = Instant::now();
        info!("[{}] starting from cost {:.3} ({} vertices)", self.label(), self.cost, self.tour.len());

        let (termination, passes) = match self.config.annealing {
            Some(schedule) => self.anneal(schedule, &start),
            None => match self.config.neighborhood {
                Neighborhood::TwoOpt => self.descend_two_opt(&start),
                Neighborhood::ThreeOpt => self.descend_three_opt(&start),
            },
        };

        // Drop accumulated rounding from the incremental deltas.
        self.cost = self.graph.tour_cost(&self.tour);
        self.best.validate(&self.graph);
        if self.cost <= self.best.cost {
            self.best.tour.clone_from(&self.tour);
            self.best.cost = self.cost;
        }

        self.elapsed = start.elapsed();
        self.best.termination = termination;
        self.best.iterations = Some(passes);
        self.best.computation_time = self.elapsed.as_secs_f64();

        if termination.timed_out() {
            warn!("[{}] time limit reached after {} passes", self.label(), passes);
        }
        info!(
            "[{}] finished: cost {:.3} ({}), {} improving / {} worsening moves, {:.3}s",
            self.label(),
            self.best.cost,
            termination,
            self.improving_moves,
            self.worsening_moves,
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
