// 0/1 integer programs and the solver capability that answers them.
//
// The optimizer states each lineup as a `BinaryProgram`: one indicator per
// pool player, a linear objective to maximize, and dense linear constraints.
// Any backend implementing `BinarySolver` can answer it; `MicroLpSolver` uses
// good_lp with the pure-Rust microlp branch and bound.

use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use thiserror::Error;

/// Integrality tolerance when reading a relaxed value back as 0/1.
const BINARY_THRESHOLD: f64 = 0.5;
/// Feasibility tolerance for `BinaryProgram::is_satisfied_by`.
const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolverError {
    #[error("program is infeasible")]
    Infeasible,

    #[error("solver backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Le,
    Ge,
}

/// `sum(coefficients[i] * x[i]) <cmp> rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub coefficients: Vec<f64>,
    pub comparison: Comparison,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn lhs(&self, assignment: &[bool]) -> f64 {
        self.coefficients
            .iter()
            .zip(assignment)
            .filter(|(_, &x)| x)
            .map(|(c, _)| c)
            .sum()
    }

    pub fn is_satisfied_by(&self, assignment: &[bool]) -> bool {
        let lhs = self.lhs(assignment);
        match self.comparison {
            Comparison::Eq => (lhs - self.rhs).abs() <= EPSILON,
            Comparison::Le => lhs <= self.rhs + EPSILON,
            Comparison::Ge => lhs >= self.rhs - EPSILON,
        }
    }
}

/// Maximize `objective · x` over binary `x` subject to every constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryProgram {
    pub objective: Vec<f64>,
    pub constraints: Vec<LinearConstraint>,
}

impl BinaryProgram {
    pub fn new(objective: Vec<f64>) -> Self {
        Self {
            objective,
            constraints: Vec::new(),
        }
    }

    /// Number of decision variables.
    pub fn len(&self) -> usize {
        self.objective.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objective.is_empty()
    }

    pub fn constrain(&mut self, coefficients: Vec<f64>, comparison: Comparison, rhs: f64) {
        debug_assert_eq!(coefficients.len(), self.objective.len());
        self.constraints.push(LinearConstraint {
            coefficients,
            comparison,
            rhs,
        });
    }

    /// Force a single variable to 1.
    pub fn force(&mut self, index: usize) {
        let mut coefficients = vec![0.0; self.len()];
        coefficients[index] = 1.0;
        self.constrain(coefficients, Comparison::Eq, 1.0);
    }

    pub fn is_satisfied_by(&self, assignment: &[bool]) -> bool {
        assignment.len() == self.len() && self.constraints.iter().all(|c| c.is_satisfied_by(assignment))
    }

    pub fn objective_value(&self, assignment: &[bool]) -> f64 {
        self.objective
            .iter()
            .zip(assignment)
            .filter(|(_, &x)| x)
            .map(|(c, _)| c)
            .sum()
    }
}

/// Combinatorial optimizer capability. Returns an optimal assignment, or an
/// error when none exists or the backend gives up.
pub trait BinarySolver: Sync {
    fn solve(&self, program: &BinaryProgram) -> Result<Vec<bool>, SolverError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLpSolver;

impl BinarySolver for MicroLpSolver {
    fn solve(&self, program: &BinaryProgram) -> Result<Vec<bool>, SolverError> {
        let mut vars = ProblemVariables::new();
        let xs: Vec<Variable> = (0..program.len())
            .map(|_| vars.add(variable().binary()))
            .collect();

        let objective: Expression = weighted_sum(&xs, &program.objective);
        let mut model = vars.maximise(objective).using(microlp);
        for c in &program.constraints {
            let lhs = weighted_sum(&xs, &c.coefficients);
            let rhs = c.rhs;
            model = model.with(match c.comparison {
                Comparison::Eq => constraint!(lhs == rhs),
                Comparison::Le => constraint!(lhs <= rhs),
                Comparison::Ge => constraint!(lhs >= rhs),
            });
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => SolverError::Infeasible,
            other => SolverError::Backend(other.to_string()),
        })?;

        Ok(xs
            .iter()
            .map(|&x| solution.value(x) > BINARY_THRESHOLD)
            .collect())
    }
}

fn weighted_sum(xs: &[Variable], coefficients: &[f64]) -> Expression {
    xs.iter()
        .zip(coefficients)
        .filter(|(_, &c)| c != 0.0)
        .map(|(&x, &c)| c * x)
        .sum()
}
