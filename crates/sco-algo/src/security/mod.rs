//! Security-constrained setpoint optimization
//!
//! Builds a linear program over HVDC / PST setpoint deviations, restores
//! feasibility when some contingencies cannot be secured, and sweeps a battery
//! of directional objectives over the resulting feasible region.
//!
//! ## Formulation
//!
//! ```text
//! maximize    m                                  (minimum margin)
//!
//! subject to:
//!   min_e − ref_e ≤ Δ_e ≤ max_e − ref_e          setpoint bounds
//!   flow_p = F_p + Σ_d s_{p,d} · Δ_d             linearized flow of pair p
//!   flow_p + σ⁺_p ≤ upper_p                      upper margin
//!  −flow_p + σ⁻_p ≤ −lower_p                     lower margin
//!   σ_p ≤ σ⁺_p,  σ_p ≤ σ⁻_p                      σ_p = min margin of p
//!   m ≤ σ_p                                      m = min over all pairs
//! ```
//!
//! For a line, `[lower, upper] = [−k·L, k·L]` with `k` the IST margin factor
//! and `L` its thermal limit. For an AC-emulated HVDC the pair's flow is the
//! HVDC's own power and `[lower, upper]` are its setpoint bounds.
//!
//! ## Phases
//!
//! ```text
//!   PROBING ──m* ≥ −tol──▶ SATISFIED ─┐
//!      │                              ├──▶ FINALIZED ──▶ sweep
//!      └──m* < −tol──▶ RESTORING ─────┘
//! ```
//!
//! Each phase works on its own [`SecurityModel`] handle: bound fixes and
//! objective swaps return new handles sharing the constraint rows.

mod builder;
mod config;
mod restoration;
mod session;
mod solution;
mod sweep;

pub use builder::{CounterTradingVars, ModelLayout, PairVars, SecurityModel};
pub use config::OptimizationConfig;
pub use restoration::{
    restore_feasibility, ContingencyTriage, Restoration, RestorationOutcome, RestorationReport,
};
pub use session::SetpointOptimizer;
pub use solution::{write_csv, write_json, BoundaryPoint, ScenarioResult, SessionResult};
pub use sweep::{sweep_boundary, sweep_objectives, SweepOutput, MAX_MARGIN_LABEL};

use crate::lp::SolveError;
use sco_core::ScoError;
use thiserror::Error;

/// Errors raised while building or solving a security model.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Invalid optimization request (unknown element, wrong kind, bad parameter)
    #[error("configuration error: {0}")]
    Config(String),

    /// Sensitivity data that cannot be interpreted safely
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// No (monitored element, contingency) pair carries a usable limit
    #[error("no constrained (monitored element, contingency) pair; nothing to secure")]
    NoConstraints,

    /// A solve failed in the named phase
    #[error("{phase} solve failed: {source}")]
    Solve {
        phase: String,
        #[source]
        source: SolveError,
    },
}

impl SecurityError {
    pub fn solve(phase: impl Into<String>, source: SolveError) -> Self {
        SecurityError::Solve {
            phase: phase.into(),
            source,
        }
    }
}

impl From<SecurityError> for ScoError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::Config(msg) => ScoError::Config(msg),
            SecurityError::DataIntegrity(msg) => ScoError::DataIntegrity(msg),
            SecurityError::NoConstraints => ScoError::Config(err.to_string()),
            SecurityError::Solve { .. } => ScoError::Solver(err.to_string()),
        }
    }
}
