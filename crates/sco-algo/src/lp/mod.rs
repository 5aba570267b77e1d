//! Solver-independent linear program handle.
//!
//! An [`LpModel`] is a value: variable names and constraint rows are shared
//! behind `Arc`s and never change once built, while variable bounds and the
//! objective are owned by each handle. Re-objectiving or fixing a variable
//! returns a new handle and leaves the original untouched, so a temporary fix
//! made while exploring one sub-problem cannot leak into another.
//!
//! ```
//! use sco_algo::lp::{Bounds, LinearExpr, LpModelBuilder, Objective, RowSense};
//!
//! let mut builder = LpModelBuilder::new();
//! let x = builder.add_var("x", Bounds::new(0.0, 10.0));
//! let y = builder.add_var("y", Bounds::free());
//! builder.add_row("y_le_x", LinearExpr::from_terms([(y, 1.0), (x, -1.0)]), RowSense::Le, 0.0);
//!
//! let model = builder.build(Objective::maximize("max_y", LinearExpr::var(y)));
//! let fixed = model.with_fixed(x, 3.0);
//!
//! assert_eq!(model.bounds(x), Bounds::new(0.0, 10.0));
//! assert!(fixed.bounds(x).is_fixed());
//! assert_eq!(model.row_count(), fixed.row_count());
//! ```

mod backend;

pub use backend::{GoodLpBackend, LpBackend, LpSolverKind, SolveError};

use std::fmt;
use std::sync::Arc;

/// Index of a variable inside an [`LpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Box bounds of a variable; infinite values mean unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn free() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    pub fn fixed(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }

    pub fn contains(&self, value: f64, tolerance: f64) -> bool {
        value >= self.min - tolerance && value <= self.max + tolerance
    }
}

/// Affine expression `constant + Σ coefficient·variable`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub constant: f64,
    pub terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            terms: Vec::new(),
        }
    }

    pub fn var(var: VarId) -> Self {
        Self {
            constant: 0.0,
            terms: vec![(var, 1.0)],
        }
    }

    pub fn from_terms(terms: impl IntoIterator<Item = (VarId, f64)>) -> Self {
        Self {
            constant: 0.0,
            terms: terms.into_iter().collect(),
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Sum of `self` and `scale · other`.
    pub fn plus_scaled(mut self, other: &LinearExpr, scale: f64) -> Self {
        self.constant += scale * other.constant;
        for &(var, coefficient) in &other.terms {
            self.add_term(var, scale * coefficient);
        }
        self
    }

    pub fn negated(&self) -> Self {
        LinearExpr::default().plus_scaled(self, -1.0)
    }

    /// Evaluate against a dense value vector indexed by [`VarId`].
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, (var, c)| acc + c * values[var.0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for RowSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RowSense::Le => "<=",
            RowSense::Ge => ">=",
            RowSense::Eq => "==",
        })
    }
}

/// Constraint row `expr (sense) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRow {
    pub label: String,
    pub expr: LinearExpr,
    pub sense: RowSense,
    pub rhs: f64,
}

impl LinearRow {
    /// Amount by which `values` violates this row (0 when satisfied).
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.expr.eval(values);
        match self.sense {
            RowSense::Le => (lhs - self.rhs).max(0.0),
            RowSense::Ge => (self.rhs - lhs).max(0.0),
            RowSense::Eq => (lhs - self.rhs).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub label: String,
    pub sense: ObjectiveSense,
    pub expr: LinearExpr,
}

impl Objective {
    pub fn minimize(label: impl Into<String>, expr: LinearExpr) -> Self {
        Self {
            label: label.into(),
            sense: ObjectiveSense::Minimize,
            expr,
        }
    }

    pub fn maximize(label: impl Into<String>, expr: LinearExpr) -> Self {
        Self {
            label: label.into(),
            sense: ObjectiveSense::Maximize,
            expr,
        }
    }
}

/// Accumulates variables and rows, then freezes them into an [`LpModel`].
#[derive(Debug, Default)]
pub struct LpModelBuilder {
    names: Vec<String>,
    bounds: Vec<Bounds>,
    rows: Vec<LinearRow>,
}

impl LpModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, name: impl Into<String>, bounds: Bounds) -> VarId {
        let id = VarId(self.names.len());
        self.names.push(name.into());
        self.bounds.push(bounds);
        id
    }

    pub fn add_row(&mut self, label: impl Into<String>, expr: LinearExpr, sense: RowSense, rhs: f64) {
        self.rows.push(LinearRow {
            label: label.into(),
            expr,
            sense,
            rhs,
        });
    }

    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    pub fn build(self, objective: Objective) -> LpModel {
        LpModel {
            names: Arc::new(self.names),
            rows: Arc::new(self.rows),
            bounds: self.bounds,
            objective,
        }
    }
}

/// Immutable-rows LP handle. Cloning is cheap apart from the bounds vector.
#[derive(Debug, Clone)]
pub struct LpModel {
    names: Arc<Vec<String>>,
    rows: Arc<Vec<LinearRow>>,
    bounds: Vec<Bounds>,
    objective: Objective,
}

impl LpModel {
    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[LinearRow] {
        &self.rows
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.names[var.0]
    }

    pub fn bounds(&self, var: VarId) -> Bounds {
        self.bounds[var.0]
    }

    pub fn all_bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn with_objective(&self, objective: Objective) -> Self {
        Self {
            objective,
            ..self.clone()
        }
    }

    pub fn with_bounds(&self, var: VarId, bounds: Bounds) -> Self {
        let mut next = self.clone();
        next.bounds[var.0] = bounds;
        next
    }

    pub fn with_fixed(&self, var: VarId, value: f64) -> Self {
        self.with_bounds(var, Bounds::fixed(value))
    }

    /// Whether two handles share the same constraint rows.
    pub fn shares_rows_with(&self, other: &LpModel) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }

    /// Labels of rows and variables that `solution` violates by more than `tolerance`.
    pub fn violations(&self, solution: &LpSolution, tolerance: f64) -> Vec<String> {
        let mut out = Vec::new();
        for (i, bounds) in self.bounds.iter().enumerate() {
            if !bounds.contains(solution.values[i], tolerance) {
                out.push(format!("bounds({})", self.names[i]));
            }
        }
        for row in self.rows.iter() {
            if row.violation(&solution.values) > tolerance {
                out.push(row.label.clone());
            }
        }
        out
    }
}

/// Primal point returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub values: Vec<f64>,
    pub objective_value: f64,
}

impl LpSolution {
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.0]
    }

    pub fn eval(&self, expr: &LinearExpr) -> f64 {
        expr.eval(&self.values)
    }
}
