//! Heuristic and metaheuristic solvers.
//!
//! This module exports the initializers, local search and the population-based
//! engines.

pub mod aco;
pub mod construction;
pub mod convergence;
pub mod genetic;
pub mod local_search;
pub mod pso;

pub use aco::*;
pub use construction::*;
pub use convergence::*;
pub use genetic::*;
pub use local_search::*;
pub use pso::*;
