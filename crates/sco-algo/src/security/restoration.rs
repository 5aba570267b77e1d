//! Feasibility restoration.
//!
//! Probes the best achievable minimum margin. When it is negative, the
//! contingencies responsible are isolated: each gets a local relief solve,
//! the minimum margin is pinned one unit below the probe value so the
//! offenders keep some room, and every other contingency is hardened
//! (its selector slack fixed to zero).
//!
//! Margins within `tolerance` below zero count as secured. Whatever is fixed
//! afterwards is clipped to the realized value, so a pair accepted at
//! `-tolerance / 2` is held there rather than forced up to zero.

use super::{ScenarioResult, SecurityError, SecurityModel};
use crate::lp::{LinearExpr, LpBackend, LpSolution, Objective};
use crate::sensitivity::PairKey;
use sco_core::Contingency;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Relaxation applied to the minimum margin while restoring.
const RESTORATION_MARGIN_OFFSET: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorationOutcome {
    /// Every contingency can be secured at once
    Satisfied,
    /// Some contingencies were relaxed; the rest are hard
    Restored,
}

/// What restoration found out about one problematic contingency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContingencyTriage {
    pub contingency: Contingency,
    /// Elements with a negative margin at the probe point
    pub overloaded_elements: Vec<String>,
    /// Worst margin of this contingency at the probe point
    pub probe_margin: f64,
    /// Worst margin of this contingency at its own relief point
    pub best_relief_margin: f64,
    /// Whether the relief point clears every overload of this contingency
    pub resolvable: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorationReport {
    pub outcome: RestorationOutcome,
    /// Optimal minimum margin of the probe solve
    pub probe_margin: f64,
    pub triage: Vec<ContingencyTriage>,
    /// Relief point per problematic contingency, keyed `relief:<contingency>`
    pub relief: BTreeMap<String, ScenarioResult>,
    /// Contingencies whose constraints are enforced without slack
    pub hardened: Vec<Contingency>,
}

impl RestorationReport {
    pub fn problematic(&self) -> impl Iterator<Item = &Contingency> {
        self.triage.iter().map(|t| &t.contingency)
    }
}

/// Finalized model plus the report that produced it.
#[derive(Debug, Clone)]
pub struct Restoration {
    pub model: SecurityModel,
    pub report: RestorationReport,
}

enum Phase {
    Probing,
    Satisfied {
        margin: f64,
    },
    Restoring {
        margin: f64,
        probe: LpSolution,
    },
    Finalized(Restoration),
}

/// Run the probe and, if needed, restoration on `model`.
///
/// `tolerance` absorbs solver noise: a margin is negative only below `-tolerance`.
pub fn restore_feasibility(
    model: &SecurityModel,
    backend: &dyn LpBackend,
    tolerance: f64,
) -> Result<Restoration, SecurityError> {
    let probe_model = model.maximize_minimum_margin();
    let all_contingencies: BTreeSet<Contingency> = model
        .layout()
        .pairs
        .keys()
        .map(|k| k.contingency.clone())
        .collect();

    let mut phase = Phase::Probing;
    loop {
        phase = match phase {
            Phase::Probing => {
                let probe = probe_model.solve(backend, "probe")?;
                let margin = probe.value(model.minimum_margin());
                info!(margin, "probe solved");
                if margin >= -tolerance {
                    Phase::Satisfied { margin }
                } else {
                    Phase::Restoring { margin, probe }
                }
            }
            Phase::Satisfied { margin } => {
                let floor = margin.min(0.0);
                info!(floor, "all contingencies secured; minimum margin fixed");
                Phase::Finalized(Restoration {
                    model: probe_model.fix_minimum_margin(floor),
                    report: RestorationReport {
                        outcome: RestorationOutcome::Satisfied,
                        probe_margin: margin,
                        triage: Vec::new(),
                        relief: BTreeMap::new(),
                        hardened: all_contingencies.iter().cloned().collect(),
                    },
                })
            }
            Phase::Restoring { margin, probe } => Phase::Finalized(restore(
                &probe_model,
                backend,
                tolerance,
                margin,
                &probe,
                &all_contingencies,
            )?),
            Phase::Finalized(restoration) => return Ok(restoration),
        };
    }
}

fn restore(
    probe_model: &SecurityModel,
    backend: &dyn LpBackend,
    tolerance: f64,
    margin: f64,
    probe: &LpSolution,
    all_contingencies: &BTreeSet<Contingency>,
) -> Result<Restoration, SecurityError> {
    // contingency -> (overloaded elements, worst margin)
    let mut problematic: BTreeMap<Contingency, (Vec<String>, f64)> = BTreeMap::new();
    let mut probe_margins: BTreeMap<PairKey, f64> = BTreeMap::new();
    for (key, pair_margin) in probe_model.pair_margins(probe) {
        probe_margins.insert(key.clone(), pair_margin);
        if pair_margin < -tolerance {
            let entry = problematic
                .entry(key.contingency.clone())
                .or_insert_with(|| (Vec::new(), f64::INFINITY));
            entry.0.push(key.element.clone());
            entry.1 = entry.1.min(pair_margin);
        }
    }
    info!(
        margin,
        problematic = problematic.len(),
        "probe margin negative; restoring"
    );

    let relaxed = probe_model.fix_minimum_margin(margin - RESTORATION_MARGIN_OFFSET);

    let mut triage = Vec::with_capacity(problematic.len());
    let mut relief = BTreeMap::new();
    for (contingency, (overloaded, probe_margin)) in &problematic {
        let mut slacks = LinearExpr::default();
        for (key, vars) in &probe_model.layout().pairs {
            if &key.contingency == contingency {
                slacks.add_term(vars.slack, 1.0);
            }
        }
        let label = format!("relief:{contingency}");
        let relief_model = relaxed.with_objective(Objective::maximize(label.clone(), slacks));
        let solution = relief_model.solve(backend, &label)?;

        let best_relief_margin = relief_model
            .pair_margins(&solution)
            .filter(|(key, _)| &key.contingency == contingency)
            .map(|(_, m)| m)
            .fold(f64::INFINITY, f64::min);
        let resolvable = best_relief_margin >= -tolerance;
        warn!(
            contingency = %contingency,
            overloaded = ?overloaded,
            probe_margin,
            best_relief_margin,
            resolvable,
            "problematic contingency"
        );

        relief.insert(
            label,
            ScenarioResult::from_solution(&relief_model, &solution),
        );
        triage.push(ContingencyTriage {
            contingency: contingency.clone(),
            overloaded_elements: overloaded.clone(),
            probe_margin: *probe_margin,
            best_relief_margin,
            resolvable,
        });
    }

    let finalized = relaxed.harden(|key| {
        if problematic.contains_key(&key.contingency) {
            None
        } else {
            Some(probe_margins.get(key).copied().unwrap_or(0.0))
        }
    });
    let hardened: Vec<Contingency> = all_contingencies
        .iter()
        .filter(|c| !problematic.contains_key(*c))
        .cloned()
        .collect();
    info!(hardened = hardened.len(), "restoration finalized");

    Ok(Restoration {
        model: finalized,
        report: RestorationReport {
            outcome: RestorationOutcome::Restored,
            probe_margin: margin,
            triage,
            relief,
            hardened,
        },
    })
}
