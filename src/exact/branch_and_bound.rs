//! Depth-first branch and bound over LP relaxations solved with `minilp`.
//!
//! Each node fixes a subset of variables to 0 or 1 and solves the relaxation of
//! the remaining ones. Nodes whose bound cannot beat the incumbent are pruned;
//! otherwise the most fractional variable is branched on, `= 1` side first.
//! Order variables stay continuous and are never branched on.

use std::time::Instant;

use log::debug;
use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};

use crate::error::{Result, TspError};
use crate::exact::program::{Assignment, BinaryProgram, BinaryProgramSolver, ProgramOutcome, Sense};

/// Per-variable branching decision; `None` is free.
type Fixings = Vec<Option<bool>>;

struct Relaxation {
    objective: f64,
    values: Vec<f64>,
    /// `(v, u[v])` for every order variable.
    orders: Vec<(usize, f64)>,
}

#[derive(Debug, Clone)]
pub struct BranchAndBound {
    /// Distance from 0 or 1 under which a value counts as integral.
    pub integrality_tolerance: f64,
    nodes: usize,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        BranchAndBound { integrality_tolerance: 1e-6, nodes: 0 }
    }
}

impl BranchAndBound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes explored across every `solve` call.
    pub fn nodes_explored(&self) -> usize {
        self.nodes
    }

    fn relax(&self, program: &BinaryProgram, fixings: &Fixings) -> Result<Option<Relaxation>> {
        let mut problem = Problem::new(OptimizationDirection::Minimize);

        let vars: Vec<Variable> = program
            .arcs()
            .zip(fixings)
            .map(|((i, j), fix)| {
                let bounds = match fix {
                    Some(true) => (1.0, 1.0),
                    Some(false) => (0.0, 0.0),
                    None => (0.0, 1.0),
                };
                problem.add_var(program.objective(i, j), bounds)
            })
            .collect();

        let mut order_vars: Vec<Option<Variable>> = vec![None; program.num_vertices()];
        for (v, lo, hi) in program.order_variables() {
            order_vars[v] = Some(problem.add_var(0.0, (lo, hi)));
        }

        for constraint in program.constraints() {
            let mut expr = LinearExpr::empty();
            for &((i, j), coeff) in &constraint.terms {
                expr.add(vars[program.arc_index(i, j)], coeff);
            }
            for &(v, coeff) in &constraint.orders {
                let var = order_vars.get(v).copied().flatten().ok_or_else(|| {
                    TspError::Solver(format!("constraint {} uses missing order variable u_{v}", constraint.name))
                })?;
                expr.add(var, coeff);
            }
            let op = match constraint.sense {
                Sense::Le => ComparisonOp::Le,
                Sense::Eq => ComparisonOp::Eq,
                Sense::Ge => ComparisonOp::Ge,
            };
            problem.add_constraint(expr, op, constraint.rhs);
        }

        match problem.solve() {
            Ok(solution) => Ok(Some(Relaxation {
                objective: solution.objective(),
                values: vars.iter().map(|&v| solution[v]).collect(),
                orders: order_vars
                    .iter()
                    .enumerate()
                    .filter_map(|(v, &var)| var.map(|var| (v, solution[var])))
                    .collect(),
            })),
            Err(minilp::Error::Infeasible) => Ok(None),
            Err(err) => Err(TspError::Solver(format!("LP relaxation failed: {err:?}"))),
        }
    }

    /// Index of the value farthest from integral, if any is beyond tolerance.
    fn most_fractional(&self, values: &[f64]) -> Option<usize> {
        let mut best = None;
        let mut best_gap = self.integrality_tolerance;
        for (idx, &v) in values.iter().enumerate() {
            let gap = (v - v.round()).abs();
            if gap > best_gap {
                best_gap = gap;
                best = Some(idx);
            }
        }
        best
    }

    fn to_assignment(program: &BinaryProgram, relaxation: &Relaxation) -> Assignment {
        let mut assignment = Assignment::empty(program.num_vertices());
        for ((i, j), &v) in program.arcs().zip(&relaxation.values) {
            if v > 0.5 {
                assignment.select(i, j);
            }
        }
        for &(v, u) in &relaxation.orders {
            assignment.set_order(v, u);
        }
        assignment
    }
}

impl BinaryProgramSolver for BranchAndBound {
    fn name(&self) -> &str {
        "branch-and-bound"
    }

    fn solve(&mut self, program: &BinaryProgram, time_limit: f64) -> Result<ProgramOutcome> {
        let start = Instant::now();
        let mut stack: Vec<Fixings> = vec![vec![None; program.num_variables()]];
        let mut incumbent: Option<(f64, Assignment)> = None;
        let mut timed_out = false;
        let mut explored = 0;

        while let Some(fixings) = stack.pop() {
            if start.elapsed().as_secs_f64() >= time_limit {
                timed_out = true;
                break;
            }
            explored += 1;

            let Some(relaxation) = self.relax(program, &fixings)? else {
                continue;
            };
            if let Some((bound, _)) = &incumbent {
                if relaxation.objective >= bound - 1e-9 {
                    continue;
                }
            }

            match self.most_fractional(&relaxation.values) {
                None => {
                    let assignment = Self::to_assignment(program, &relaxation);
                    let value = program.evaluate(&assignment);
                    if incumbent.as_ref().map_or(true, |(best, _)| value < *best) {
                        incumbent = Some((value, assignment));
                    }
                }
                Some(k) => {
                    let mut down = fixings.clone();
                    down[k] = Some(false);
                    let mut up = fixings;
                    up[k] = Some(true);
                    stack.push(down);
                    stack.push(up);
                }
            }
        }

        self.nodes += explored;
        debug!(
            "[B&B] {} nodes, incumbent {:?}, {:.3}s",
            explored,
            incumbent.as_ref().map(|(v, _)| *v),
            start.elapsed().as_secs_f64()
        );

        Ok(match (incumbent, timed_out) {
            (Some((_, a)), false) => ProgramOutcome::Optimal(a),
            (Some((_, a)), true) => ProgramOutcome::Feasible(a),
            (None, false) => ProgramOutcome::Infeasible,
            (None, true) => ProgramOutcome::TimeLimit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::program::LinearConstraint;
    use crate::graph::{unit_square, Graph};

    #[test]
    fn test_assignment_relaxation_is_integral() {
        let program = BinaryProgram::assignment(&unit_square());
        let mut bb = BranchAndBound::new();
        match bb.solve(&program, 10.0).unwrap() {
            ProgramOutcome::Optimal(a) => {
                assert!(program.is_feasible(&a));
                // Two 2-cycles along the sides are cheapest: 4 arcs of length 1.
                assert!((program.evaluate(&a) - 4.0).abs() < 1e-9);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_branching_respects_added_cut() {
        let graph = Graph::random(5, 3).unwrap();
        let mut program = BinaryProgram::assignment(&graph);
        // Forbid every 2-cycle.
        for i in 0..5 {
            for j in i + 1..5 {
                program.add_constraint(LinearConstraint::new(
                    format!("pair_{i}_{j}"),
                    vec![((i, j), 1.0), ((j, i), 1.0)],
                    Sense::Le,
                    1.0,
                ));
            }
        }

        let mut bb = BranchAndBound::new();
        match bb.solve(&program, 30.0).unwrap() {
            ProgramOutcome::Optimal(a) => {
                assert!(program.is_feasible(&a));
                for i in 0..5 {
                    for j in 0..5 {
                        if i != j {
                            assert!(!(a.is_selected(i, j) && a.is_selected(j, i)));
                        }
                    }
                }
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(bb.nodes_explored() >= 1);
    }

    #[test]
    fn test_mtz_program_yields_single_tour() {
        let graph = Graph::random(5, 8).unwrap();
        let program = BinaryProgram::miller_tucker_zemlin(&graph);
        let (_, optimum) = crate::exact::held_karp(&graph).unwrap();

        let mut bb = BranchAndBound::new();
        match bb.solve(&program, 60.0).unwrap() {
            ProgramOutcome::Optimal(a) => {
                assert!(program.is_feasible(&a));
                assert!((program.evaluate(&a) - optimum).abs() < 1e-6);
                assert_eq!(crate::exact::find_subtours(&a).len(), 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_infeasible_program() {
        let mut program = BinaryProgram::assignment(&unit_square());
        program.add_constraint(LinearConstraint::new("none", vec![((0, 1), 1.0)], Sense::Ge, 2.0));
        let mut bb = BranchAndBound::new();
        assert_eq!(bb.solve(&program, 10.0).unwrap(), ProgramOutcome::Infeasible);
    }

    #[test]
    fn test_zero_budget_times_out() {
        let program = BinaryProgram::assignment(&unit_square());
        let mut bb = BranchAndBound::new();
        assert_eq!(bb.solve(&program, 0.0).unwrap(), ProgramOutcome::TimeLimit);
    }
}
