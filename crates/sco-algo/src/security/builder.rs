//! Security model construction.

use super::{OptimizationConfig, SecurityError};
use crate::lp::{
    Bounds, LinearExpr, LpBackend, LpModel, LpModelBuilder, LpSolution, Objective, RowSense, VarId,
};
use crate::sensitivity::{PairKey, PairLimit, SensitivityIndex};
use sco_core::{ControlKind, ControllableElement, Contingency, CounterTradingElement, NetworkModel};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Width of the PST curative range as a fraction of the PST's nominal band,
/// centered on the preventive setpoint.
const PST_CURATIVE_FRACTION: f64 = 0.2;

/// Variables and flow expression of one constrained pair.
#[derive(Debug, Clone)]
pub struct PairVars {
    pub slack_pos: VarId,
    pub slack_neg: VarId,
    /// Selector equal to `min(slack_pos, slack_neg)` at any optimum that pushes it up
    pub slack: VarId,
    /// Flow (lines) or power (AC-emulated HVDC) as an affine function of the deltas
    pub flow: LinearExpr,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CounterTradingVars {
    pub value: VarId,
    /// `|value|` surrogate
    pub abs: VarId,
}

/// Where every quantity of the session lives inside the LP.
#[derive(Debug, Clone)]
pub struct ModelLayout {
    /// Setpoint deviation of each optimized HVDC / PST
    pub deltas: BTreeMap<String, VarId>,
    pub references: BTreeMap<String, f64>,
    pub kinds: BTreeMap<String, ControlKind>,
    pub counter_trading: BTreeMap<String, CounterTradingVars>,
    /// Post-contingency deviation, per N-1 contingency and curative element
    pub curative: BTreeMap<Contingency, BTreeMap<String, VarId>>,
    pub pairs: BTreeMap<PairKey, PairVars>,
    pub minimum_margin: VarId,
}

impl ModelLayout {
    /// Optimized elements (controllables, then counter-trading) with the
    /// variable holding their deviation from reference.
    pub fn axes(&self) -> Vec<(&str, VarId)> {
        let mut axes: Vec<(&str, VarId)> = self
            .deltas
            .iter()
            .map(|(id, var)| (id.as_str(), *var))
            .collect();
        axes.extend(
            self.counter_trading
                .iter()
                .map(|(id, vars)| (id.as_str(), vars.value)),
        );
        axes.sort_by(|a, b| a.0.cmp(b.0));
        axes
    }

    fn deviation(&self, driver: &str, contingency: &Contingency) -> Option<LinearExpr> {
        if let Some(delta) = self.deltas.get(driver) {
            let mut expr = LinearExpr::var(*delta);
            if let Some(curative) = self.curative.get(contingency).and_then(|c| c.get(driver)) {
                expr.add_term(*curative, 1.0);
            }
            return Some(expr);
        }
        self.counter_trading
            .get(driver)
            .map(|vars| LinearExpr::var(vars.value))
    }
}

/// Live LP of one optimization session.
///
/// Every modifier returns a new handle; the layout and constraint rows are
/// shared.
#[derive(Debug, Clone)]
pub struct SecurityModel {
    layout: Arc<ModelLayout>,
    lp: LpModel,
}

impl SecurityModel {
    /// Build the LP for `network` under `config`, maximizing the minimum margin.
    pub fn build(
        network: &NetworkModel,
        index: &SensitivityIndex,
        config: &OptimizationConfig,
    ) -> Result<Self, SecurityError> {
        config.validate()?;
        if index.pair_count() == 0 {
            return Err(SecurityError::NoConstraints);
        }

        let mut lp = LpModelBuilder::new();
        let minimum_margin = lp.add_var("minimum_margin", Bounds::free());
        let mut layout = ModelLayout {
            deltas: BTreeMap::new(),
            references: BTreeMap::new(),
            kinds: BTreeMap::new(),
            counter_trading: BTreeMap::new(),
            curative: BTreeMap::new(),
            pairs: BTreeMap::new(),
            minimum_margin,
        };

        // Setpoint deltas
        for kind in [ControlKind::Hvdc, ControlKind::Pst] {
            for element in select_controllables(network, config, kind)? {
                if layout.deltas.contains_key(&element.id) {
                    continue;
                }
                let (lo, hi) = element.delta_bounds();
                let var = lp.add_var(format!("delta[{}]", element.id), Bounds::new(lo, hi));
                layout.deltas.insert(element.id.clone(), var);
                layout.references.insert(element.id.clone(), element.reference);
                layout.kinds.insert(element.id.clone(), kind);
            }
        }

        // Counter-trading levers
        let counter_trading = select_counter_trading(network, config)?;
        let mut volume = LinearExpr::default();
        for element in counter_trading {
            if element.is_inert() {
                debug!(element = %element.id, "counter-trading element pinned at zero, skipped");
                continue;
            }
            if layout.counter_trading.contains_key(&element.id) {
                continue;
            }
            let value = lp.add_var(
                format!("ct[{}]", element.id),
                Bounds::new(element.min, element.max),
            );
            let abs = lp.add_var(
                format!("ct_abs[{}]", element.id),
                Bounds::new(0.0, element.min.abs().max(element.max.abs())),
            );
            lp.add_row(
                format!("ct_abs_pos[{}]", element.id),
                LinearExpr::from_terms([(abs, 1.0), (value, -1.0)]),
                RowSense::Ge,
                0.0,
            );
            lp.add_row(
                format!("ct_abs_neg[{}]", element.id),
                LinearExpr::from_terms([(abs, 1.0), (value, 1.0)]),
                RowSense::Ge,
                0.0,
            );
            volume.add_term(abs, 1.0);
            layout
                .counter_trading
                .insert(element.id.clone(), CounterTradingVars { value, abs });
        }
        if let Some(cap) = config.counter_trading_volume_cap {
            if !layout.counter_trading.is_empty() {
                lp.add_row("ct_volume_cap", volume, RowSense::Le, cap);
            }
        }

        // Curative deltas
        let outages: Vec<Contingency> = index
            .contingencies()
            .into_iter()
            .filter(|c| !c.is_basecase())
            .collect();
        for id in &config.curative_elements {
            let element = match (layout.deltas.get(id), network.controllable(id)) {
                (Some(_), Some(element)) => element,
                _ => {
                    return Err(SecurityError::Config(format!(
                        "curative element '{id}' is not an optimized HVDC or PST"
                    )))
                }
            };
            let base = layout.deltas[id];
            let (lo, hi) = element.delta_bounds();
            let bounds = match element.kind {
                ControlKind::Hvdc => Bounds::new(-element.band_width(), element.band_width()),
                ControlKind::Pst => {
                    let half = element.band_width() * PST_CURATIVE_FRACTION / 2.0;
                    Bounds::new(-half, half)
                }
            };
            for contingency in &outages {
                let var = lp.add_var(format!("curative[{id}@{contingency}]"), bounds);
                let post = LinearExpr::from_terms([(base, 1.0), (var, 1.0)]);
                lp.add_row(
                    format!("curative_max[{id}@{contingency}]"),
                    post.clone(),
                    RowSense::Le,
                    hi,
                );
                lp.add_row(
                    format!("curative_min[{id}@{contingency}]"),
                    post,
                    RowSense::Ge,
                    lo,
                );
                layout
                    .curative
                    .entry(contingency.clone())
                    .or_default()
                    .insert(id.clone(), var);
            }
        }

        // Flow and margin rows
        for (key, limit) in index.constrained_pairs() {
            let reference_flow = index.reference_flow(key).ok_or_else(|| {
                SecurityError::DataIntegrity(format!("pair {key} has no reference flow"))
            })?;
            let mut flow = LinearExpr::constant(reference_flow);
            for (driver, coefficient) in index.coefficients(key) {
                if let Some(deviation) = layout.deviation(driver, &key.contingency) {
                    flow = flow.plus_scaled(&deviation, coefficient);
                }
            }

            let (lower, upper) = match limit {
                PairLimit::Thermal(limit) => {
                    let bound = config.ist_margin * limit;
                    (-bound, bound)
                }
                PairLimit::Power { min, max } => {
                    // AC-emulated HVDC: own setpoint plus the equivalent-line flow
                    let reference = network.reference_setpoint(&key.element).unwrap_or(0.0);
                    flow.add_constant(reference);
                    if let Some(deviation) = layout.deviation(&key.element, &key.contingency) {
                        flow = flow.plus_scaled(&deviation, 1.0);
                    }
                    (min, max)
                }
            };

            let slack_pos = lp.add_var(format!("slack_pos[{key}]"), Bounds::free());
            let slack_neg = lp.add_var(format!("slack_neg[{key}]"), Bounds::free());
            let slack = lp.add_var(format!("slack[{key}]"), Bounds::free());

            let mut upper_row = flow.clone();
            upper_row.add_term(slack_pos, 1.0);
            lp.add_row(format!("upper[{key}]"), upper_row, RowSense::Le, upper);

            let mut lower_row = flow.negated();
            lower_row.add_term(slack_neg, 1.0);
            lp.add_row(format!("lower[{key}]"), lower_row, RowSense::Le, -lower);

            lp.add_row(
                format!("select_pos[{key}]"),
                LinearExpr::from_terms([(slack, 1.0), (slack_pos, -1.0)]),
                RowSense::Le,
                0.0,
            );
            lp.add_row(
                format!("select_neg[{key}]"),
                LinearExpr::from_terms([(slack, 1.0), (slack_neg, -1.0)]),
                RowSense::Le,
                0.0,
            );
            lp.add_row(
                format!("minimum_margin[{key}]"),
                LinearExpr::from_terms([(minimum_margin, 1.0), (slack, -1.0)]),
                RowSense::Le,
                0.0,
            );

            layout.pairs.insert(
                key.clone(),
                PairVars {
                    slack_pos,
                    slack_neg,
                    slack,
                    flow,
                    lower,
                    upper,
                },
            );
        }

        debug!(
            variables = lp.var_count(),
            pairs = layout.pairs.len(),
            optimized = layout.deltas.len() + layout.counter_trading.len(),
            curative = layout.curative.values().map(|c| c.len()).sum::<usize>(),
            "security model built"
        );

        let lp = lp.build(max_minimum_margin(minimum_margin));
        Ok(Self {
            layout: Arc::new(layout),
            lp,
        })
    }

    pub fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    pub fn lp(&self) -> &LpModel {
        &self.lp
    }

    pub fn minimum_margin(&self) -> VarId {
        self.layout.minimum_margin
    }

    fn derive(&self, lp: LpModel) -> Self {
        Self {
            layout: Arc::clone(&self.layout),
            lp,
        }
    }

    pub fn with_objective(&self, objective: Objective) -> Self {
        self.derive(self.lp.with_objective(objective))
    }

    pub fn maximize_minimum_margin(&self) -> Self {
        self.with_objective(max_minimum_margin(self.layout.minimum_margin))
    }

    pub fn fix_minimum_margin(&self, value: f64) -> Self {
        self.derive(self.lp.with_fixed(self.layout.minimum_margin, value))
    }

    pub fn release_minimum_margin(&self) -> Self {
        self.derive(self.lp.with_bounds(self.layout.minimum_margin, Bounds::free()))
    }

    /// Fix the selector slack of every pair for which `floor` yields a value.
    ///
    /// A hardened pair normally gets a zero slack; a floor below zero keeps a
    /// pair that sits inside the feasibility tolerance at its realized margin.
    pub fn harden(&self, mut floor: impl FnMut(&PairKey) -> Option<f64>) -> Self {
        let mut lp = self.lp.clone();
        for (key, vars) in &self.layout.pairs {
            if let Some(value) = floor(key) {
                lp = lp.with_fixed(vars.slack, value.min(0.0));
            }
        }
        self.derive(lp)
    }

    /// Solve under the current objective, tagging failures with `phase`.
    pub fn solve(&self, backend: &dyn LpBackend, phase: &str) -> Result<LpSolution, SecurityError> {
        let start = Instant::now();
        let solution = backend
            .solve(&self.lp)
            .map_err(|e| SecurityError::solve(phase, e))?;
        debug!(
            phase,
            objective = %self.lp.objective().label,
            value = solution.objective_value,
            elapsed_ms = start.elapsed().as_millis() as u64,
            backend = backend.id(),
            "lp solved"
        );
        Ok(solution)
    }

    pub fn realized_flow(&self, pair: &PairKey, solution: &LpSolution) -> Option<f64> {
        self.layout.pairs.get(pair).map(|v| solution.eval(&v.flow))
    }

    /// Distance of the pair's flow to the nearer of its bounds (negative when violated).
    pub fn realized_margin(&self, pair: &PairKey, solution: &LpSolution) -> Option<f64> {
        self.layout.pairs.get(pair).map(|v| pair_margin(v, solution))
    }

    pub fn pair_margins<'a>(
        &'a self,
        solution: &'a LpSolution,
    ) -> impl Iterator<Item = (&'a PairKey, f64)> + 'a {
        self.layout
            .pairs
            .iter()
            .map(move |(k, v)| (k, pair_margin(v, solution)))
    }

    /// Worst realized margin across every constrained pair.
    pub fn worst_margin(&self, solution: &LpSolution) -> f64 {
        self.pair_margins(solution)
            .map(|(_, m)| m)
            .fold(f64::INFINITY, f64::min)
    }

    /// Absolute setpoints (`reference + Δ`) of every optimized element.
    pub fn setpoints(&self, solution: &LpSolution) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for (id, var) in &self.layout.deltas {
            let reference = self.layout.references.get(id).copied().unwrap_or(0.0);
            out.insert(id.clone(), reference + solution.value(*var));
        }
        for (id, vars) in &self.layout.counter_trading {
            out.insert(id.clone(), solution.value(vars.value));
        }
        out
    }

    /// Post-contingency absolute setpoints of the curative elements.
    pub fn curative_setpoints(
        &self,
        solution: &LpSolution,
    ) -> BTreeMap<Contingency, BTreeMap<String, f64>> {
        self.layout
            .curative
            .iter()
            .map(|(contingency, vars)| {
                let setpoints = vars
                    .iter()
                    .map(|(id, var)| {
                        let base = self.layout.deltas[id];
                        let reference = self.layout.references.get(id).copied().unwrap_or(0.0);
                        (
                            id.clone(),
                            reference + solution.value(base) + solution.value(*var),
                        )
                    })
                    .collect();
                (contingency.clone(), setpoints)
            })
            .collect()
    }

    /// Realized flow of every constrained pair, grouped by contingency.
    pub fn flows(&self, solution: &LpSolution) -> BTreeMap<Contingency, BTreeMap<String, f64>> {
        let mut out: BTreeMap<Contingency, BTreeMap<String, f64>> = BTreeMap::new();
        for (key, vars) in &self.layout.pairs {
            out.entry(key.contingency.clone())
                .or_default()
                .insert(key.element.clone(), solution.eval(&vars.flow));
        }
        out
    }
}

fn max_minimum_margin(minimum_margin: VarId) -> Objective {
    Objective::maximize("max_minimum_margin", LinearExpr::var(minimum_margin))
}

fn pair_margin(vars: &PairVars, solution: &LpSolution) -> f64 {
    let flow = solution.eval(&vars.flow);
    (vars.upper - flow).min(flow - vars.lower)
}

fn select_controllables<'a>(
    network: &'a NetworkModel,
    config: &OptimizationConfig,
    kind: ControlKind,
) -> Result<Vec<&'a ControllableElement>, SecurityError> {
    let Some(ids) = config.selection(kind) else {
        return Ok(network.controllables_of(kind).collect());
    };
    ids.iter()
        .map(|id| match network.controllable(id) {
            Some(element) if element.kind == kind => Ok(element),
            Some(element) => Err(SecurityError::Config(format!(
                "'{id}' is listed as {kind} but is a {}",
                element.kind
            ))),
            None if network.counter_trading_element(id).is_some() => Err(SecurityError::Config(
                format!("'{id}' is listed as {kind} but is a counter-trading element"),
            )),
            None => Err(SecurityError::Config(format!(
                "{kind} '{id}' is not defined in the network"
            ))),
        })
        .collect()
}

fn select_counter_trading<'a>(
    network: &'a NetworkModel,
    config: &OptimizationConfig,
) -> Result<Vec<&'a CounterTradingElement>, SecurityError> {
    let Some(ids) = config.counter_trading.as_deref() else {
        return Ok(network.counter_trading().collect());
    };
    ids.iter()
        .map(|id| {
            network.counter_trading_element(id).ok_or_else(|| {
                if network.controllable(id).is_some() {
                    SecurityError::Config(format!(
                        "'{id}' is listed as counter-trading but is an HVDC or PST"
                    ))
                } else {
                    SecurityError::Config(format!(
                        "counter-trading element '{id}' is not defined in the network"
                    ))
                }
            })
        })
        .collect()
}
