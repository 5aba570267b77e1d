//! # sco-algo: setpoint optimization algorithms
//!
//! - [`sensitivity`]: indexes the raw sensitivity table into constrained pairs
//! - [`lp`]: solver-independent LP handle and `good_lp` backends
//! - [`security`]: model builder, feasibility restoration, boundary sweep and
//!   the [`SetpointOptimizer`] session that chains them

pub mod lp;
pub mod security;
pub mod sensitivity;

pub use lp::{GoodLpBackend, LpBackend, LpSolverKind, SolveError};
pub use security::{
    OptimizationConfig, RestorationOutcome, ScenarioResult, SecurityError, SecurityModel,
    SessionResult, SetpointOptimizer,
};
pub use sensitivity::{LimitSelection, PairKey, PairLimit, SensitivityIndex};
