//! Exact TSP from the compact Miller-Tucker-Zemlin formulation.
//!
//! Instead of adding subtour cuts on demand, the program carries an order
//! variable per vertex up front, so a single solve call returns a tour.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::error::{Result, TspError};
use crate::exact::branch_and_bound::BranchAndBound;
use crate::exact::program::{BinaryProgram, BinaryProgramSolver, ProgramOutcome};
use crate::exact::subtour::{find_subtours, Backend, ExactConfig};
use crate::graph::Graph;
use crate::solution::{Solution, Solver, Termination};

pub struct MillerTuckerZemlin {
    config: ExactConfig,
    graph: Graph,
    backend: Box<dyn BinaryProgramSolver + Send>,
    program: BinaryProgram,
    best: Solution,
    solve_calls: usize,
    elapsed: Duration,
}

impl MillerTuckerZemlin {
    pub fn new(graph: Graph, config: ExactConfig) -> Self {
        let backend: Box<dyn BinaryProgramSolver + Send> = match config.backend {
            Backend::BranchAndBound => Box::new(BranchAndBound::new()),
            #[cfg(feature = "gurobi")]
            Backend::Gurobi => Box::new(crate::exact::gurobi::GurobiBackend::default()),
        };
        Self::with_backend(graph, config, backend)
    }

    pub fn with_backend(graph: Graph, config: ExactConfig, backend: Box<dyn BinaryProgramSolver + Send>) -> Self {
        let program = BinaryProgram::miller_tucker_zemlin(&graph);
        MillerTuckerZemlin {
            config,
            graph,
            backend,
            program,
            best: Solution::new(),
            solve_calls: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn program(&self) -> &BinaryProgram {
        &self.program
    }

    pub fn solve_calls(&self) -> usize {
        self.solve_calls
    }

    fn finish(&self, tour: Vec<usize>, termination: Termination) -> Solution {
        let mut solution = Solution::from_tour(&self.graph, tour, self.name());
        solution.termination = termination;
        solution
    }

    fn unresolved(&self) -> Solution {
        Solution::unresolved(self.name())
    }

    /// Solve the program once. A selection that is not one Hamiltonian cycle
    /// means the backend broke the ordering constraints and is an error.
    pub fn try_run(&mut self, start: &Instant) -> Result<Solution> {
        let n = self.graph.len();
        if n < 2 {
            return Ok(self.finish(self.graph.vertex_indices().collect(), Termination::Optimal));
        }

        let remaining = self.config.time_limit - start.elapsed().as_secs_f64();
        if remaining <= 0.0 {
            return Ok(self.unresolved());
        }

        let outcome = self.backend.solve(&self.program, remaining)?;
        self.solve_calls += 1;

        let (assignment, termination) = match outcome {
            ProgramOutcome::Optimal(a) => (a, Termination::Optimal),
            ProgramOutcome::Feasible(a) => (a, Termination::TimeLimit),
            ProgramOutcome::TimeLimit => return Ok(self.unresolved()),
            ProgramOutcome::Infeasible => {
                return Err(TspError::Solver(format!(
                    "{} reported the ordering program infeasible",
                    self.backend.name()
                )))
            }
        };

        let mut cycles = find_subtours(&assignment);
        debug!("[MTZ] {} cycle(s) in the returned selection", cycles.len());
        match cycles.pop() {
            Some(tour) if cycles.is_empty() && tour.len() == n => Ok(self.finish(tour, termination)),
            _ => Err(TspError::Solver(format!(
                "{} returned a selection that is not a single tour",
                self.backend.name()
            ))),
        }
    }
}

impl Solver for MillerTuckerZemlin {
    fn name(&self) -> &str {
        "Exact-MTZ"
    }

    fn run(&mut self) -> Solution {
        let start = Instant::now();
        info!(
            "[MTZ] {} vertices, {} arc and {} order variables, backend {}",
            self.graph.len(),
            self.program.num_variables(),
            self.program.num_order_variables(),
            self.backend.name()
        );

        let mut solution = match self.try_run(&start) {
            Ok(solution) => solution,
            Err(e) => {
                error!("[MTZ] {}", e);
                self.unresolved()
            }
        };

        self.elapsed = start.elapsed();
        solution.iterations = Some(self.solve_calls);
        solution.computation_time = self.elapsed.as_secs_f64();

        if solution.is_resolved() {
            info!(
                "[MTZ] cost {:.3} ({}) in {:.3}s",
                solution.cost,
                solution.termination,
                self.elapsed.as_secs_f64()
            );
        } else {
            warn!("[MTZ] no tour within {:.1}s", self.config.time_limit);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::dynamic_programming::held_karp;
    use crate::exact::program::Assignment;
    use crate::graph::unit_square;
    use crate::solution::is_permutation;

    /// Returns one fixed outcome.
    struct Fixed(ProgramOutcome);

    impl BinaryProgramSolver for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn solve(&mut self, _program: &BinaryProgram, _time_limit: f64) -> Result<ProgramOutcome> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_unit_square_perimeter() {
        let mut mtz = MillerTuckerZemlin::new(unit_square(), ExactConfig::default());
        let solution = mtz.run();

        assert_eq!(solution.termination, Termination::Optimal);
        assert!(is_permutation(&solution.tour, 4));
        assert!((solution.cost - 4.0).abs() < 1e-9);
        assert_eq!(solution.iterations, Some(1));
        assert_eq!(solution.algorithm, "Exact-MTZ");
    }

    #[test]
    fn test_matches_held_karp() {
        for seed in 0..3 {
            let graph = Graph::random(6, seed).unwrap();
            let (_, optimum) = held_karp(&graph).unwrap();

            let mut mtz = MillerTuckerZemlin::new(graph, ExactConfig { time_limit: 120.0, ..Default::default() });
            let solution = mtz.run();

            assert_eq!(solution.termination, Termination::Optimal, "seed {seed}");
            assert!(is_permutation(&solution.tour, 6));
            assert!((solution.cost - optimum).abs() < 1e-6, "seed {seed}: {} vs {}", solution.cost, optimum);
        }
    }

    #[test]
    fn test_tiny_graphs() {
        let single = Graph::random(1, 0).unwrap();
        let solution = MillerTuckerZemlin::new(single, ExactConfig::default()).run();
        assert_eq!(solution.tour, vec![0]);
        assert_eq!(solution.termination, Termination::Optimal);

        let pair = Graph::random(2, 0).unwrap();
        let expected = 2.0 * pair.cost(0, 1);
        let solution = MillerTuckerZemlin::new(pair, ExactConfig::default()).run();
        assert!(is_permutation(&solution.tour, 2));
        assert!((solution.cost - expected).abs() < 1e-9);
    }

    #[test]
    fn test_time_limit_keeps_feasible_tour() {
        let perimeter = Assignment::from_arcs(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let backend = Box::new(Fixed(ProgramOutcome::Feasible(perimeter)));
        let mut mtz = MillerTuckerZemlin::with_backend(unit_square(), ExactConfig::default(), backend);
        let solution = mtz.run();

        assert_eq!(solution.termination, Termination::TimeLimit);
        assert_eq!(solution.tour, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_unresolved_without_tour() {
        let backend = Box::new(Fixed(ProgramOutcome::TimeLimit));
        let solution = MillerTuckerZemlin::with_backend(unit_square(), ExactConfig::default(), backend).run();
        assert!(!solution.is_resolved());

        let zero = ExactConfig { time_limit: 0.0, ..Default::default() };
        let solution = MillerTuckerZemlin::new(unit_square(), zero).run();
        assert!(!solution.is_resolved());
    }

    #[test]
    fn test_subtour_selection_is_rejected() {
        let two_loops = Assignment::from_arcs(4, &[(0, 1), (1, 0), (2, 3), (3, 2)]);
        let backend = Box::new(Fixed(ProgramOutcome::Optimal(two_loops)));
        let mut mtz = MillerTuckerZemlin::with_backend(unit_square(), ExactConfig::default(), backend);

        assert!(mtz.try_run(&Instant::now()).is_err());
        assert!(!mtz.run().is_resolved());
    }
}
