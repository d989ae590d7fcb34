//! Gurobi backend for the binary programs of the exact solvers.
//!
//! Only built with `--features gurobi`; needs a local Gurobi installation and
//! licence.

use grb::prelude::*;

use crate::error::{Result, TspError};
use crate::exact::program::{Assignment, BinaryProgram, BinaryProgramSolver, ProgramOutcome, Sense};

/// Gurobi solver configuration
#[derive(Debug, Clone)]
pub struct GurobiBackend {
    /// MIP gap tolerance
    pub mip_gap: f64,
    /// Number of threads (0 = automatic)
    pub threads: i32,
    /// Enable verbose output
    pub verbose: bool,
}

impl Default for GurobiBackend {
    fn default() -> Self {
        GurobiBackend { mip_gap: 1e-6, threads: 0, verbose: false }
    }
}

fn solver_error(context: &str, e: grb::Error) -> TspError {
    TspError::Solver(format!("{context}: {e}"))
}

impl BinaryProgramSolver for GurobiBackend {
    fn name(&self) -> &str {
        "gurobi"
    }

    fn solve(&mut self, program: &BinaryProgram, time_limit: f64) -> Result<ProgramOutcome> {
        let n = program.num_vertices();

        let env = Env::new("").map_err(|e| solver_error("Failed to create Gurobi environment", e))?;
        let mut model = Model::with_env("TSP", env).map_err(|e| solver_error("Failed to create model", e))?;

        model
            .set_param(param::TimeLimit, time_limit.max(0.0))
            .map_err(|e| solver_error("Failed to set time limit", e))?;
        model
            .set_param(param::MIPGap, self.mip_gap)
            .map_err(|e| solver_error("Failed to set MIP gap", e))?;
        model
            .set_param(param::Threads, self.threads)
            .map_err(|e| solver_error("Failed to set threads", e))?;
        if !self.verbose {
            model
                .set_param(param::OutputFlag, 0)
                .map_err(|e| solver_error("Failed to set output flag", e))?;
        }

        // x[i * n + j] = 1 if arc (i, j) is selected
        let mut x: Vec<Option<Var>> = vec![None; n * n];
        for (i, j) in program.arcs() {
            let var = add_binvar!(model, name: &format!("x_{}_{}", i, j), obj: program.objective(i, j))
                .map_err(|e| solver_error("Failed to add variable", e))?;
            x[i * n + j] = Some(var);
        }

        // u[v] for the vertices the program orders
        let mut u: Vec<Option<Var>> = vec![None; n];
        for (v, lo, hi) in program.order_variables() {
            let var = add_ctsvar!(model, name: &format!("u_{}", v), bounds: lo..hi)
                .map_err(|e| solver_error("Failed to add variable", e))?;
            u[v] = Some(var);
        }

        model.update().map_err(|e| solver_error("Failed to update model", e))?;

        for constraint in program.constraints() {
            let arcs = constraint
                .terms
                .iter()
                .filter_map(|&((i, j), coeff)| x[i * n + j].map(|var| coeff * var));
            let orders = constraint.orders.iter().filter_map(|&(v, coeff)| u[v].map(|var| coeff * var));
            let expr: Expr = arcs.chain(orders).grb_sum();
            let rhs = constraint.rhs;
            let constr = match constraint.sense {
                Sense::Le => c!(expr <= rhs),
                Sense::Eq => c!(expr == rhs),
                Sense::Ge => c!(expr >= rhs),
            };
            model
                .add_constr(&constraint.name, constr)
                .map_err(|e| solver_error("Failed to add constraint", e))?;
        }

        model.optimize().map_err(|e| solver_error("Optimization failed", e))?;

        let status = model.status().map_err(|e| solver_error("Failed to get status", e))?;
        let solutions = model.get_attr(attr::SolCount).unwrap_or(0);

        let read_assignment = |model: &Model| -> Result<Assignment> {
            let mut assignment = Assignment::empty(n);
            for (i, j) in program.arcs() {
                if let Some(var) = &x[i * n + j] {
                    let val = model
                        .get_obj_attr(attr::X, var)
                        .map_err(|e| solver_error("Failed to read variable", e))?;
                    if val > 0.5 {
                        assignment.select(i, j);
                    }
                }
            }
            for (v, var) in u.iter().enumerate() {
                if let Some(var) = var {
                    let val = model
                        .get_obj_attr(attr::X, var)
                        .map_err(|e| solver_error("Failed to read variable", e))?;
                    assignment.set_order(v, val);
                }
            }
            Ok(assignment)
        };

        match status {
            Status::Optimal => Ok(ProgramOutcome::Optimal(read_assignment(&model)?)),
            Status::TimeLimit if solutions > 0 => Ok(ProgramOutcome::Feasible(read_assignment(&model)?)),
            Status::TimeLimit => Ok(ProgramOutcome::TimeLimit),
            Status::Infeasible => Ok(ProgramOutcome::Infeasible),
            other => Err(TspError::Solver(format!("Gurobi stopped with status {other:?}"))),
        }
    }
}
