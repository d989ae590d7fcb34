//! Binary program over directed arcs and the solver interface it is handed to.
//!
//! Binary variables are keyed by ordered vertex pairs `(i, j)` with `i != j`;
//! each one says whether the arc `i -> j` is selected. A program may also carry
//! one bounded continuous order variable `u[v]` per vertex, which the
//! Miller-Tucker-Zemlin formulation uses to rank vertices along the tour.

use std::fmt;

use crate::error::Result;
use crate::graph::Graph;

pub type Arc = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sense::Le => "<=",
            Sense::Eq => "==",
            Sense::Ge => ">=",
        })
    }
}

/// `sum(coeff * x[arc]) + sum(coeff * u[v]) sense rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub terms: Vec<(Arc, f64)>,
    /// Terms over order variables, keyed by vertex.
    pub orders: Vec<(usize, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn new(name: impl Into<String>, terms: Vec<(Arc, f64)>, sense: Sense, rhs: f64) -> Self {
        LinearConstraint { name: name.into(), terms, orders: Vec::new(), sense, rhs }
    }

    pub fn with_orders(mut self, orders: Vec<(usize, f64)>) -> Self {
        self.orders = orders;
        self
    }

    pub fn lhs(&self, assignment: &Assignment) -> f64 {
        let arcs: f64 = self
            .terms
            .iter()
            .filter(|((i, j), _)| assignment.is_selected(*i, *j))
            .map(|(_, coeff)| coeff)
            .sum();
        let orders: f64 = self.orders.iter().map(|&(v, coeff)| coeff * assignment.order(v)).sum();
        arcs + orders
    }

    pub fn is_satisfied(&self, assignment: &Assignment) -> bool {
        const TOL: f64 = 1e-6;
        let lhs = self.lhs(assignment);
        match self.sense {
            Sense::Le => lhs <= self.rhs + TOL,
            Sense::Eq => (lhs - self.rhs).abs() <= TOL,
            Sense::Ge => lhs >= self.rhs - TOL,
        }
    }
}

/// Minimization program with one binary variable per arc, plus optional
/// continuous order variables that never enter the objective.
#[derive(Debug, Clone)]
pub struct BinaryProgram {
    n: usize,
    /// Row-major `n * n`; diagonal entries are unused.
    objective: Vec<f64>,
    /// Bounds of `u[v]`, `None` when the program has no such variable.
    order_bounds: Vec<Option<(f64, f64)>>,
    constraints: Vec<LinearConstraint>,
}

impl BinaryProgram {
    pub fn new(n: usize) -> Self {
        BinaryProgram { n, objective: vec![0.0; n * n], order_bounds: vec![None; n], constraints: Vec::new() }
    }

    /// Assignment relaxation of the TSP: arc costs as objective, exactly one
    /// outgoing and one incoming arc per vertex.
    pub fn assignment(graph: &Graph) -> Self {
        let n = graph.len();
        let mut program = Self::new(n);
        for (i, j) in program.arcs().collect::<Vec<_>>() {
            program.set_objective(i, j, graph.cost(i, j));
        }
        for v in 0..n {
            let out: Vec<(Arc, f64)> = (0..n).filter(|&j| j != v).map(|j| ((v, j), 1.0)).collect();
            let inc: Vec<(Arc, f64)> = (0..n).filter(|&i| i != v).map(|i| ((i, v), 1.0)).collect();
            program.add_constraint(LinearConstraint::new(format!("out_{v}"), out, Sense::Eq, 1.0));
            program.add_constraint(LinearConstraint::new(format!("in_{v}"), inc, Sense::Eq, 1.0));
        }
        program
    }

    /// Assignment program plus Miller-Tucker-Zemlin ordering: `u[v]` in
    /// `[1, n - 1]` for every vertex but 0, and
    /// `u[i] - u[j] + n * x[i][j] <= n - 1` for every arc between two such
    /// vertices. A selected arc forces `u[j] >= u[i] + 1`, so no cycle can
    /// avoid vertex 0 and every feasible assignment is a single tour.
    pub fn miller_tucker_zemlin(graph: &Graph) -> Self {
        let mut program = Self::assignment(graph);
        let n = program.n;
        let big = n as f64;
        for v in 1..n {
            program.add_order_variable(v, 1.0, big - 1.0);
        }
        for i in 1..n {
            for j in (1..n).filter(|&j| j != i) {
                program.add_constraint(
                    LinearConstraint::new(format!("mtz_{i}_{j}"), vec![((i, j), big)], Sense::Le, big - 1.0)
                        .with_orders(vec![(i, 1.0), (j, -1.0)]),
                );
            }
        }
        program
    }

    pub fn num_vertices(&self) -> usize {
        self.n
    }

    /// Binary arc variables only.
    pub fn num_variables(&self) -> usize {
        self.n * self.n.saturating_sub(1)
    }

    pub fn num_order_variables(&self) -> usize {
        self.order_bounds.iter().flatten().count()
    }

    pub fn add_order_variable(&mut self, v: usize, lower: f64, upper: f64) {
        self.order_bounds[v] = Some((lower, upper));
    }

    /// `(v, lower, upper)` for every order variable, by vertex.
    pub fn order_variables(&self) -> impl Iterator<Item = (usize, f64, f64)> + '_ {
        self.order_bounds
            .iter()
            .enumerate()
            .filter_map(|(v, bounds)| bounds.map(|(lo, hi)| (v, lo, hi)))
    }

    /// Every variable key, row by row.
    pub fn arcs(&self) -> impl Iterator<Item = Arc> {
        let n = self.n;
        (0..n).flat_map(move |i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
    }

    /// Dense index of an arc, matching the order of [`BinaryProgram::arcs`].
    pub fn arc_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i != j && i < self.n && j < self.n);
        i * (self.n - 1) + if j > i { j - 1 } else { j }
    }

    pub fn objective(&self, i: usize, j: usize) -> f64 {
        self.objective[i * self.n + j]
    }

    pub fn set_objective(&mut self, i: usize, j: usize, coeff: f64) {
        self.objective[i * self.n + j] = coeff;
    }

    pub fn add_constraint(&mut self, constraint: LinearConstraint) {
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        assignment.selected_arcs().map(|(i, j)| self.objective(i, j)).sum()
    }

    pub fn is_feasible(&self, assignment: &Assignment) -> bool {
        const TOL: f64 = 1e-6;
        let in_bounds = self.order_variables().all(|(v, lo, hi)| {
            let u = assignment.order(v);
            u >= lo - TOL && u <= hi + TOL
        });
        in_bounds && self.constraints.iter().all(|c| c.is_satisfied(assignment))
    }
}

/// 0/1 value for every arc of an `n`-vertex program, and a value for every
/// order variable (0 where the program has none).
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    n: usize,
    selected: Vec<bool>,
    orders: Vec<f64>,
}

impl Assignment {
    pub fn empty(n: usize) -> Self {
        Assignment { n, selected: vec![false; n * n], orders: vec![0.0; n] }
    }

    pub fn from_arcs(n: usize, arcs: &[Arc]) -> Self {
        let mut assignment = Self::empty(n);
        for &(i, j) in arcs {
            assignment.select(i, j);
        }
        assignment
    }

    pub fn num_vertices(&self) -> usize {
        self.n
    }

    pub fn select(&mut self, i: usize, j: usize) {
        self.selected[i * self.n + j] = true;
    }

    pub fn is_selected(&self, i: usize, j: usize) -> bool {
        i < self.n && j < self.n && self.selected[i * self.n + j]
    }

    pub fn selected_arcs(&self) -> impl Iterator<Item = Arc> + '_ {
        let n = self.n;
        self.selected
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .map(move |(idx, _)| (idx / n, idx % n))
    }

    pub fn set_order(&mut self, v: usize, value: f64) {
        self.orders[v] = value;
    }

    pub fn order(&self, v: usize) -> f64 {
        self.orders.get(v).copied().unwrap_or(0.0)
    }

    /// First selected arc leaving `i`.
    pub fn successor(&self, i: usize) -> Option<usize> {
        (0..self.n).find(|&j| j != i && self.is_selected(i, j))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgramOutcome {
    /// Proven optimal for the program as given.
    Optimal(Assignment),
    /// Best integral assignment found before the time limit.
    Feasible(Assignment),
    Infeasible,
    /// Time limit hit before any integral assignment was found.
    TimeLimit,
}

/// Black-box 0/1 solver consumed by the subtour elimination loop.
pub trait BinaryProgramSolver {
    fn name(&self) -> &str;

    /// Solve `program` within `time_limit` seconds.
    fn solve(&mut self, program: &BinaryProgram, time_limit: f64) -> Result<ProgramOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::unit_square;

    #[test]
    fn test_assignment_program_shape() {
        let program = BinaryProgram::assignment(&unit_square());
        assert_eq!(program.num_variables(), 12);
        assert_eq!(program.arcs().count(), 12);
        assert_eq!(program.constraints().len(), 8);
        assert!((program.objective(0, 2) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_arc_index_matches_iteration_order() {
        let program = BinaryProgram::new(5);
        for (idx, (i, j)) in program.arcs().enumerate() {
            assert_eq!(program.arc_index(i, j), idx);
        }
    }

    #[test]
    fn test_feasibility_and_objective() {
        let program = BinaryProgram::assignment(&unit_square());
        let perimeter = Assignment::from_arcs(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let two_loops = Assignment::from_arcs(4, &[(0, 1), (1, 0), (2, 3), (3, 2)]);
        let broken = Assignment::from_arcs(4, &[(0, 1), (1, 2), (2, 3)]);

        assert!(program.is_feasible(&perimeter));
        assert!(program.is_feasible(&two_loops));
        assert!(!program.is_feasible(&broken));
        assert!((program.evaluate(&perimeter) - 4.0).abs() < 1e-12);
        assert_eq!(perimeter.successor(3), Some(0));
        assert_eq!(broken.successor(3), None);
    }

    #[test]
    fn test_mtz_program_shape() {
        let program = BinaryProgram::miller_tucker_zemlin(&unit_square());
        assert_eq!(program.num_variables(), 12);
        assert_eq!(program.num_order_variables(), 3);
        // 8 degree constraints plus one ordering constraint per arc among 1..4.
        assert_eq!(program.constraints().len(), 8 + 6);
        assert_eq!(program.order_variables().next(), Some((1, 1.0, 3.0)));
    }

    #[test]
    fn test_mtz_ordering_rejects_subtours() {
        let program = BinaryProgram::miller_tucker_zemlin(&unit_square());

        let mut perimeter = Assignment::from_arcs(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        for v in 1..4 {
            perimeter.set_order(v, v as f64);
        }
        assert!(program.is_feasible(&perimeter));

        // 2 -> 3 -> 2 needs u[3] >= u[2] + 1 and u[2] >= u[3] + 1.
        let two_loops = Assignment::from_arcs(4, &[(0, 1), (1, 0), (2, 3), (3, 2)]);
        for orders in [[1.0, 2.0, 3.0], [1.0, 3.0, 2.0], [3.0, 1.0, 1.0]] {
            let mut candidate = two_loops.clone();
            for (v, &u) in (1..4).zip(&orders) {
                candidate.set_order(v, u);
            }
            assert!(!program.is_feasible(&candidate), "{orders:?}");
        }

        let mut out_of_bounds = perimeter.clone();
        out_of_bounds.set_order(3, 4.0);
        assert!(!program.is_feasible(&out_of_bounds));
    }
}
