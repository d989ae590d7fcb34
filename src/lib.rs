//! TSP Solver Library
//!
//! Heuristic and exact solvers for the symmetric Travelling
//! Salesman Problem on complete graphs.
//!
//! # Features
//!
//! - 2-opt and 3-opt local search, each with a simulated-annealing variant
//! - Genetic algorithm with sub-tour crossover
//! - Ant colony optimization with pheromone stored on the graph
//! - Discrete particle swarm optimization over swap sequences
//! - Exact solvers over a binary-program backend (built-in branch and bound,
//!   or Gurobi behind the `gurobi` feature): iterative subtour elimination and
//!   the Miller-Tucker-Zemlin formulation
//! - Held-Karp dynamic programming for small graphs
//! - Benchmarking with a CSV result log
//!
//! # Example
//!
//! ```no_run
//! use tsp_solvers::graph::Graph;
//! use tsp_solvers::heuristics::genetic::{GAConfig, GeneticAlgorithm};
//! use tsp_solvers::solution::Solver;
//!
//! let graph = Graph::random(50, 7).unwrap();
//!
//! let mut ga = GeneticAlgorithm::new(graph, GAConfig::default());
//! let solution = ga.run();
//!
//! println!("Solution cost: {:.2}", solution.cost);
//! ```

pub mod benchmark;
pub mod error;
pub mod exact;
pub mod graph;
pub mod heuristics;
pub mod solution;

pub use error::{Result, TspError};
pub use graph::Graph;
pub use solution::{Solution, Solver};
