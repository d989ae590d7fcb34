//! Exact TSP by iterative subtour elimination (Dantzig-Fulkerson-Johnson cuts).
//!
//! Start from the assignment program, solve it, split the selected arcs into
//! cycles and, while there is more than one, forbid each cycle with
//! `sum(x[i][j] for i != j in S) <= |S| - 1` and solve again.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::error::{Result, TspError};
use crate::exact::branch_and_bound::BranchAndBound;
use crate::exact::program::{
    Arc, Assignment, BinaryProgram, BinaryProgramSolver, LinearConstraint, ProgramOutcome, Sense,
};
use crate::graph::Graph;
use crate::solution::{Solution, Solver, Termination};

/// Binary program backend used by [`SubtourElimination::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    BranchAndBound,
    #[cfg(feature = "gurobi")]
    Gurobi,
}

#[derive(Debug, Clone)]
pub struct ExactConfig {
    /// Time limit in seconds, shared by every solve call
    pub time_limit: f64,
    pub backend: Backend,
}

impl Default for ExactConfig {
    fn default() -> Self {
        ExactConfig { time_limit: 60.0, backend: Backend::BranchAndBound }
    }
}

/// Split the selected arcs into directed cycles.
///
/// Walks successors from the lowest unvisited vertex until it reaches a vertex
/// already seen. Every vertex lands in exactly one returned cycle as long as
/// each vertex has one outgoing and one incoming arc; a vertex without a
/// successor closes its walk early.
pub fn find_subtours(assignment: &Assignment) -> Vec<Vec<usize>> {
    let n = assignment.num_vertices();
    let mut visited = vec![false; n];
    let mut cycles = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut cycle = Vec::new();
        let mut current = start;
        while !visited[current] {
            visited[current] = true;
            cycle.push(current);
            match assignment.successor(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        cycles.push(cycle);
    }

    cycles
}

/// `sum(x[i][j] for i != j in cycle) <= |cycle| - 1`
pub fn subtour_cut(cycle: &[usize], index: usize) -> LinearConstraint {
    let terms: Vec<(Arc, f64)> = cycle
        .iter()
        .flat_map(|&i| cycle.iter().filter(move |&&j| j != i).map(move |&j| ((i, j), 1.0)))
        .collect();
    LinearConstraint::new(format!("sec_{index}"), terms, Sense::Le, cycle.len() as f64 - 1.0)
}

pub struct SubtourElimination {
    config: ExactConfig,
    graph: Graph,
    backend: Box<dyn BinaryProgramSolver + Send>,
    program: BinaryProgram,
    best: Solution,
    solve_calls: usize,
    cuts_added: usize,
    elapsed: Duration,
}

impl SubtourElimination {
    pub fn new(graph: Graph, config: ExactConfig) -> Self {
        let backend: Box<dyn BinaryProgramSolver + Send> = match config.backend {
            Backend::BranchAndBound => Box::new(BranchAndBound::new()),
            #[cfg(feature = "gurobi")]
            Backend::Gurobi => Box::new(crate::exact::gurobi::GurobiBackend::default()),
        };
        Self::with_backend(graph, config, backend)
    }

    pub fn with_backend(graph: Graph, config: ExactConfig, backend: Box<dyn BinaryProgramSolver + Send>) -> Self {
        let program = BinaryProgram::assignment(&graph);
        SubtourElimination {
            config,
            graph,
            backend,
            program,
            best: Solution::new(),
            solve_calls: 0,
            cuts_added: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Program with every cut added so far.
    pub fn program(&self) -> &BinaryProgram {
        &self.program
    }

    pub fn solve_calls(&self) -> usize {
        self.solve_calls
    }

    pub fn cuts_added(&self) -> usize {
        self.cuts_added
    }

    fn finish(&self, tour: Vec<usize>, termination: Termination) -> Solution {
        let mut solution = Solution::from_tour(&self.graph, tour, self.name());
        solution.termination = termination;
        solution
    }

    fn unresolved(&self) -> Solution {
        Solution::unresolved(self.name())
    }

    /// Run the cutting-plane loop. Backend failures are errors; running out of
    /// time is not and yields the unresolved sentinel.
    pub fn try_run(&mut self, start: &Instant) -> Result<Solution> {
        let n = self.graph.len();
        if n < 2 {
            return Ok(self.finish(self.graph.vertex_indices().collect(), Termination::Optimal));
        }

        loop {
            let remaining = self.config.time_limit - start.elapsed().as_secs_f64();
            if remaining <= 0.0 {
                return Ok(self.unresolved());
            }

            let outcome = self.backend.solve(&self.program, remaining)?;
            self.solve_calls += 1;

            let (assignment, proven) = match outcome {
                ProgramOutcome::Optimal(a) => (a, true),
                ProgramOutcome::Feasible(a) => (a, false),
                ProgramOutcome::TimeLimit => return Ok(self.unresolved()),
                ProgramOutcome::Infeasible => {
                    return Err(TspError::Solver(format!(
                        "{} reported the program infeasible after {} cuts",
                        self.backend.name(),
                        self.cuts_added
                    )))
                }
            };

            let cycles = find_subtours(&assignment);
            debug!(
                "[Exact] solve {}: {} cycle(s), sizes {:?}",
                self.solve_calls,
                cycles.len(),
                cycles.iter().map(Vec::len).collect::<Vec<_>>()
            );

            if cycles.len() == 1 && cycles[0].len() == n {
                let tour = cycles.into_iter().next().unwrap_or_default();
                let termination = if proven { Termination::Optimal } else { Termination::TimeLimit };
                return Ok(self.finish(tour, termination));
            }

            for cycle in &cycles {
                let cut = subtour_cut(cycle, self.cuts_added);
                self.program.add_constraint(cut);
                self.cuts_added += 1;
            }
        }
    }
}

impl Solver for SubtourElimination {
    fn name(&self) -> &str {
        "Exact-DFJ"
    }

    fn run(&mut self) -> Solution {
        let start = Instant::now();
        info!(
            "[Exact] {} vertices, {} variables, backend {}",
            self.graph.len(),
            self.program.num_variables(),
            self.backend.name()
        );

        let mut solution = match self.try_run(&start) {
            Ok(solution) => solution,
            Err(e) => {
                error!("[Exact] {}", e);
                self.unresolved()
            }
        };

        self.elapsed = start.elapsed();
        solution.iterations = Some(self.solve_calls);
        solution.computation_time = self.elapsed.as_secs_f64();

        if solution.is_resolved() {
            info!(
                "[Exact] cost {:.3} ({}) after {} solve calls and {} cuts, {:.3}s",
                solution.cost,
                solution.termination,
                self.solve_calls,
                self.cuts_added,
                self.elapsed.as_secs_f64()
            );
        } else {
            warn!(
                "[Exact] no single tour within {:.1}s ({} solve calls, {} cuts)",
                self.config.time_limit, self.solve_calls, self.cuts_added
            );
        }

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
