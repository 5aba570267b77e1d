//! LP solver backends.
//!
//! The optimization drivers only see the [`LpBackend`] trait. The default
//! [`GoodLpBackend`] materializes an [`LpModel`] into `good_lp` and hands it
//! to Clarabel or, with the `solver-highs` feature, HiGHS.

use super::{LinearExpr, LpModel, LpSolution, ObjectiveSense, RowSense};
use anyhow::anyhow;
#[cfg(feature = "solver-clarabel")]
use good_lp::solvers::clarabel::clarabel as clarabel_solver;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs as highs_solver;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Distinct solver outcomes that are not an optimal point.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolveError {
    #[error("problem is infeasible")]
    Infeasible,
    #[error("problem is unbounded")]
    Unbounded,
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl From<ResolutionError> for SolveError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Infeasible => SolveError::Infeasible,
            ResolutionError::Unbounded => SolveError::Unbounded,
            other => SolveError::Numerical(other.to_string()),
        }
    }
}

/// Solves an [`LpModel`] to optimality.
pub trait LpBackend: Send + Sync {
    /// Identifier used in logs and reports (e.g., "clarabel")
    fn id(&self) -> &str;

    fn solve(&self, model: &LpModel) -> Result<LpSolution, SolveError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LpSolverKind {
    #[default]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpSolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => "highs",
        }
    }
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

fn unknown_solver_error(label: &str) -> anyhow::Error {
    anyhow!(
        "unknown lp solver '{}'; supported values: {}",
        label,
        LpSolverKind::available().join(", ")
    )
}

impl FromStr for LpSolverKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "clarabel" => Ok(LpSolverKind::Clarabel),
            "highs" => {
                #[cfg(feature = "solver-highs")]
                {
                    Ok(LpSolverKind::Highs)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            other => Err(unknown_solver_error(other)),
        }
    }
}

impl TryFrom<String> for LpSolverKind {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LpSolverKind> for String {
    fn from(kind: LpSolverKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for LpSolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend that solves through `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpBackend {
    kind: LpSolverKind,
}

impl GoodLpBackend {
    pub fn new(kind: LpSolverKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> LpSolverKind {
        self.kind
    }
}

impl LpBackend for GoodLpBackend {
    fn id(&self) -> &str {
        self.kind.as_str()
    }

    fn solve(&self, model: &LpModel) -> Result<LpSolution, SolveError> {
        let mut vars = ProblemVariables::new();
        let mut handles: Vec<Variable> = Vec::with_capacity(model.var_count());
        let mut fixed: Vec<(Variable, f64)> = Vec::new();

        for bounds in model.all_bounds() {
            // Fixed variables become free variables pinned by an equality row;
            // zero-width boxes are poorly conditioned for interior-point solvers.
            if bounds.is_fixed() {
                let var = vars.add(variable());
                fixed.push((var, bounds.min));
                handles.push(var);
                continue;
            }
            let mut def = variable();
            if bounds.min.is_finite() {
                def = def.min(bounds.min);
            }
            if bounds.max.is_finite() {
                def = def.max(bounds.max);
            }
            handles.push(vars.add(def));
        }

        let objective = to_expression(&model.objective().expr, &handles);
        let unsolved = match model.objective().sense {
            ObjectiveSense::Maximize => vars.maximise(objective),
            ObjectiveSense::Minimize => vars.minimise(objective),
        };

        let values = match self.kind {
            LpSolverKind::Clarabel => {
                #[cfg(feature = "solver-clarabel")]
                {
                    let problem = add_rows(unsolved.using(clarabel_solver), model, &handles, &fixed);
                    extract_values(problem, &handles)?
                }
                #[cfg(not(feature = "solver-clarabel"))]
                {
                    let _ = unsolved;
                    return Err(SolveError::Numerical(
                        "clarabel backend not compiled in (enable feature solver-clarabel)".into(),
                    ));
                }
            }
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => {
                let problem = add_rows(unsolved.using(highs_solver), model, &handles, &fixed);
                extract_values(problem, &handles)?
            }
        };

        let objective_value = model.objective().expr.eval(&values);
        Ok(LpSolution {
            values,
            objective_value,
        })
    }
}

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant);
    for (var, coefficient) in &expr.terms {
        out += *coefficient * handles[var.index()];
    }
    out
}

fn add_rows<M>(mut problem: M, model: &LpModel, handles: &[Variable], fixed: &[(Variable, f64)]) -> M
where
    M: SolverModel,
{
    for (var, value) in fixed {
        problem = problem.with(constraint!(*var == *value));
    }
    for row in model.rows() {
        let lhs = to_expression(&row.expr, handles);
        let rhs = row.rhs;
        problem = match row.sense {
            RowSense::Le => problem.with(constraint!(lhs <= rhs)),
            RowSense::Ge => problem.with(constraint!(lhs >= rhs)),
            RowSense::Eq => problem.with(constraint!(lhs == rhs)),
        };
    }
    problem
}

fn extract_values<M>(problem: M, handles: &[Variable]) -> Result<Vec<f64>, SolveError>
where
    M: SolverModel<Error = ResolutionError>,
{
    let solution = problem.solve()?;
    let values: Vec<f64> = handles.iter().map(|var| solution.value(*var)).collect();
    if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
        return Err(SolveError::Numerical(format!(
            "solver returned a non-finite value for variable #{bad}"
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::{Bounds, LpModelBuilder, Objective};

    #[test]
    fn test_solver_kind_parse() {
        assert_eq!("Clarabel".parse::<LpSolverKind>().unwrap(), LpSolverKind::Clarabel);
        let err = "gurobi".parse::<LpSolverKind>().unwrap_err();
        assert!(err.to_string().contains("supported values"));
    }

    #[test]
    fn test_solver_kind_serde() {
        let kind: LpSolverKind = serde_json::from_str("\"clarabel\"").unwrap();
        assert_eq!(kind, LpSolverKind::Clarabel);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"clarabel\"");
        assert!(serde_json::from_str::<LpSolverKind>("\"simplex9000\"").is_err());
    }

    #[test]
    fn test_resolution_error_mapping() {
        assert_eq!(SolveError::from(ResolutionError::Infeasible), SolveError::Infeasible);
        assert_eq!(SolveError::from(ResolutionError::Unbounded), SolveError::Unbounded);
        assert!(matches!(
            SolveError::from(ResolutionError::Str("boom".into())),
            SolveError::Numerical(_)
        ));
    }

    #[cfg(feature = "solver-clarabel")]
    #[test]
    fn test_clarabel_small_lp() {
        // max x + y  s.t.  x + 2y <= 4, x in [0, 3], y >= 0
        let mut builder = LpModelBuilder::new();
        let x = builder.add_var("x", Bounds::new(0.0, 3.0));
        let y = builder.add_var("y", Bounds::new(0.0, f64::INFINITY));
        builder.add_row(
            "cap",
            LinearExpr::from_terms([(x, 1.0), (y, 2.0)]),
            RowSense::Le,
            4.0,
        );
        let model = builder.build(Objective::maximize(
            "sum",
            LinearExpr::from_terms([(x, 1.0), (y, 1.0)]),
        ));

        let solution = GoodLpBackend::default().solve(&model).unwrap();
        assert!((solution.value(x) - 3.0).abs() < 1e-5);
        assert!((solution.value(y) - 0.5).abs() < 1e-5);
        assert!((solution.objective_value - 3.5).abs() < 1e-5);

        let pinned = GoodLpBackend::default().solve(&model.with_fixed(x, 1.0)).unwrap();
        assert!((pinned.value(x) - 1.0).abs() < 1e-5);
        assert!((pinned.value(y) - 1.5).abs() < 1e-5);
    }

    #[cfg(feature = "solver-clarabel")]
    #[test]
    fn test_clarabel_infeasible() {
        let mut builder = LpModelBuilder::new();
        let x = builder.add_var("x", Bounds::new(0.0, 1.0));
        builder.add_row("impossible", LinearExpr::var(x), RowSense::Ge, 2.0);
        let model = builder.build(Objective::maximize("x", LinearExpr::var(x)));
        assert_eq!(
            GoodLpBackend::default().solve(&model),
            Err(SolveError::Infeasible)
        );
    }
}
