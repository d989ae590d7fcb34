//! Exact solvers.
//!
//! The main one is the subtour elimination loop, which hands binary programs to
//! a [`BinaryProgramSolver`]: the built-in branch and bound, or Gurobi when the
//! `gurobi` feature is enabled. The Miller-Tucker-Zemlin formulation hands the
//! same backends one compact program with order variables instead. Held-Karp
//! covers small graphs and doubles as a reference optimum.

pub mod branch_and_bound;
pub mod dynamic_programming;
pub mod mtz;
pub mod program;
pub mod subtour;

#[cfg(feature = "gurobi")]
pub mod gurobi;

pub use branch_and_bound::BranchAndBound;
pub use dynamic_programming::{held_karp, DynamicProgramming};
pub use mtz::MillerTuckerZemlin;
pub use program::{Assignment, BinaryProgram, BinaryProgramSolver, LinearConstraint, ProgramOutcome, Sense};
pub use subtour::{find_subtours, Backend, ExactConfig, SubtourElimination};

#[cfg(feature = "gurobi")]
pub use gurobi::GurobiBackend;
