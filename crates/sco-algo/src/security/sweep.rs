//! Boundary sweep over the finalized feasible region.

use super::{ScenarioResult, SecurityError, SecurityModel};
use crate::lp::{LinearExpr, LpBackend, Objective};
use sco_core::Contingency;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Label of the final solve that maximizes the released minimum margin.
pub const MAX_MARGIN_LABEL: &str = "max_margin";

#[derive(Debug, Clone)]
pub struct SweepOutput {
    pub scenarios: BTreeMap<String, ScenarioResult>,
    /// Realized flows at the `max_margin` point
    pub flows: BTreeMap<Contingency, BTreeMap<String, f64>>,
}

/// Directional objectives probing the extreme points of the feasible setpoints.
///
/// Per-element objectives carry a `±tie_break_weight · Σ Δ` term so that
/// ties along a face resolve to one of its end points.
pub fn sweep_objectives(model: &SecurityModel, tie_break_weight: f64) -> Vec<Objective> {
    let axes = model.layout().axes();
    let total = LinearExpr::from_terms(axes.iter().map(|(_, var)| (*var, 1.0)));
    let alternating = LinearExpr::from_terms(
        axes.iter()
            .enumerate()
            .map(|(i, (_, var))| (*var, if i % 2 == 0 { 1.0 } else { -1.0 })),
    );

    let mut objectives = Vec::with_capacity(4 + 4 * axes.len());
    if !axes.is_empty() {
        objectives.push(Objective::minimize("min_total", total.clone()));
        objectives.push(Objective::maximize("max_total", total.clone()));
        objectives.push(Objective::minimize("min_alternating", alternating.clone()));
        objectives.push(Objective::maximize("max_alternating", alternating));
    }
    for (id, var) in &axes {
        let own = LinearExpr::var(*var);
        let forward = own.clone().plus_scaled(&total, tie_break_weight);
        let reverse = own.plus_scaled(&total, -tie_break_weight);
        objectives.push(Objective::minimize(format!("min_{id}"), forward.clone()));
        objectives.push(Objective::minimize(format!("min_{id}_rev"), reverse.clone()));
        objectives.push(Objective::maximize(format!("max_{id}"), forward));
        objectives.push(Objective::maximize(format!("max_{id}_rev"), reverse));
    }
    objectives
}

/// Solve every sweep objective on `model`, then release the minimum margin
/// and maximize it.
pub fn sweep_boundary(
    model: &SecurityModel,
    backend: &dyn LpBackend,
    tie_break_weight: f64,
) -> Result<SweepOutput, SecurityError> {
    let mut scenarios = BTreeMap::new();
    for objective in sweep_objectives(model, tie_break_weight) {
        let label = objective.label.clone();
        let directed = model.with_objective(objective);
        let solution = directed.solve(backend, &label)?;
        let record = ScenarioResult::from_solution(&directed, &solution);
        debug!(label = %label, margin = record.minimum_margin, "sweep point");
        scenarios.insert(label, record);
    }

    let final_model = model.release_minimum_margin().maximize_minimum_margin();
    let solution = final_model.solve(backend, MAX_MARGIN_LABEL)?;
    let record = ScenarioResult::from_solution(&final_model, &solution);
    info!(
        points = scenarios.len(),
        margin = record.minimum_margin,
        "boundary sweep complete"
    );
    scenarios.insert(MAX_MARGIN_LABEL.to_string(), record);

    Ok(SweepOutput {
        scenarios,
        flows: final_model.flows(&solution),
    })
}
