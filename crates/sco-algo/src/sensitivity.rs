//! Sensitivity indexing
//!
//! Turns the flat sensitivity table of a [`NetworkModel`] into the lookup the
//! model builder needs:
//!
//! - which (monitored element, contingency) pairs are constrained, and by what
//!   ([`PairLimit::Thermal`] for lines, [`PairLimit::Power`] for AC-emulated
//!   HVDCs);
//! - the reference flow of every pair;
//! - `coefficients[pair][driver]`, without the reference-flow pseudo-driver.
//!
//! Monitored elements that carry sensitivities but no usable limit are
//! reported in the diagnostics and left out of the constraint set.

use crate::security::SecurityError;
use sco_core::{
    ControlKind, Contingency, Diagnostics, Driver, NetworkModel, PERMANENT_LIMIT,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// A monitored element observed in one contingency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    pub element: String,
    pub contingency: Contingency,
}

impl PairKey {
    pub fn new(element: impl Into<String>, contingency: Contingency) -> Self {
        Self {
            element: element.into(),
            contingency,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.element, self.contingency)
    }
}

/// What bounds the flow of a constrained pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairLimit {
    /// Symmetric thermal limit of an AC line
    Thermal(f64),
    /// Setpoint range of an AC-emulated HVDC
    Power { min: f64, max: f64 },
}

/// Which named limit applies to base-case and N-1 pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitSelection {
    pub limit_name: String,
    pub contingency_limit_name: Option<String>,
}

impl Default for LimitSelection {
    fn default() -> Self {
        Self {
            limit_name: PERMANENT_LIMIT.to_string(),
            contingency_limit_name: None,
        }
    }
}

/// Indexed view of the sensitivity table.
#[derive(Debug, Clone, Default)]
pub struct SensitivityIndex {
    quad_pairs: BTreeSet<PairKey>,
    hvdc_pairs: BTreeSet<PairKey>,
    coefficients: BTreeMap<PairKey, BTreeMap<String, f64>>,
    reference_flows: BTreeMap<PairKey, f64>,
    limits: BTreeMap<PairKey, PairLimit>,
    unlimited: BTreeSet<String>,
    diagnostics: Diagnostics,
}

impl SensitivityIndex {
    /// Index every sensitivity entry of `network`.
    ///
    /// Fails when a pair has driver coefficients but no reference flow, or
    /// more than one reference flow.
    pub fn build(network: &NetworkModel, selection: &LimitSelection) -> Result<Self, SecurityError> {
        let mut index = SensitivityIndex::default();
        let mut unknown_drivers: BTreeSet<&str> = BTreeSet::new();

        for entry in network.sensitivities() {
            let key = PairKey::new(entry.monitored.clone(), entry.contingency.clone());
            match &entry.driver {
                Driver::ReferenceFlow => {
                    if index.reference_flows.insert(key.clone(), entry.coefficient).is_some() {
                        return Err(SecurityError::DataIntegrity(format!(
                            "pair {key} has more than one reference flow"
                        )));
                    }
                }
                Driver::Element(driver) => {
                    if network.reference_setpoint(driver).is_none()
                        && unknown_drivers.insert(driver.as_str())
                    {
                        index.diagnostics.add_warning_with_entity(
                            "drivers",
                            "sensitivity driver is not a known element; held at reference",
                            driver,
                        );
                    }
                    let row = index.coefficients.entry(key.clone()).or_default();
                    if row.insert(driver.clone(), entry.coefficient).is_some() {
                        index.diagnostics.add_warning_with_entity(
                            "sensitivities",
                            &format!("duplicate coefficient for driver {driver}; last value kept"),
                            &key.to_string(),
                        );
                    }
                }
            }
        }

        for key in index.coefficients.keys() {
            if !index.reference_flows.contains_key(key) {
                return Err(SecurityError::DataIntegrity(format!(
                    "pair {key} has sensitivity coefficients but no reference flow"
                )));
            }
        }

        let keys: Vec<PairKey> = index.reference_flows.keys().cloned().collect();
        for key in keys {
            match resolve_limit(network, selection, &key) {
                Some(limit @ PairLimit::Thermal(_)) => {
                    index.quad_pairs.insert(key.clone());
                    index.limits.insert(key, limit);
                }
                Some(limit @ PairLimit::Power { .. }) => {
                    index.hvdc_pairs.insert(key.clone());
                    index.limits.insert(key, limit);
                }
                None => {
                    if index.unlimited.insert(key.element.clone()) {
                        warn!(element = %key.element, "no usable limit, pair excluded");
                        index.diagnostics.add_warning_with_entity(
                            "limits",
                            "sensitivity data but no known limit; excluded from constraints",
                            &key.element,
                        );
                    }
                }
            }
        }

        debug!(
            quad_pairs = index.quad_pairs.len(),
            hvdc_pairs = index.hvdc_pairs.len(),
            unlimited = index.unlimited.len(),
            "sensitivity index built"
        );
        Ok(index)
    }

    pub fn quad_pairs(&self) -> impl Iterator<Item = &PairKey> {
        self.quad_pairs.iter()
    }

    pub fn hvdc_pairs(&self) -> impl Iterator<Item = &PairKey> {
        self.hvdc_pairs.iter()
    }

    /// Every constrained pair with its limit, in key order.
    pub fn constrained_pairs(&self) -> impl Iterator<Item = (&PairKey, PairLimit)> {
        self.limits.iter().map(|(k, l)| (k, *l))
    }

    pub fn pair_count(&self) -> usize {
        self.limits.len()
    }

    pub fn limit(&self, pair: &PairKey) -> Option<PairLimit> {
        self.limits.get(pair).copied()
    }

    pub fn reference_flow(&self, pair: &PairKey) -> Option<f64> {
        self.reference_flows.get(pair).copied()
    }

    /// Driver coefficients of a pair (empty when the pair has none).
    pub fn coefficients(&self, pair: &PairKey) -> impl Iterator<Item = (&str, f64)> {
        self.coefficients
            .get(pair)
            .into_iter()
            .flat_map(|row| row.iter().map(|(d, c)| (d.as_str(), *c)))
    }

    /// Coefficient of `driver` on `pair`; a missing entry is zero.
    pub fn coefficient(&self, pair: &PairKey, driver: &str) -> f64 {
        self.coefficients
            .get(pair)
            .and_then(|row| row.get(driver))
            .copied()
            .unwrap_or(0.0)
    }

    /// Monitored elements excluded for lack of a limit.
    pub fn unlimited_elements(&self) -> impl Iterator<Item = &str> {
        self.unlimited.iter().map(String::as_str)
    }

    /// Contingencies that appear in at least one constrained pair.
    pub fn contingencies(&self) -> BTreeSet<Contingency> {
        self.limits.keys().map(|k| k.contingency.clone()).collect()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

fn resolve_limit(network: &NetworkModel, selection: &LimitSelection, key: &PairKey) -> Option<PairLimit> {
    if let Some(monitored) = network.monitored(&key.element) {
        let contingency_limit = if key.contingency.is_basecase() {
            None
        } else {
            selection
                .contingency_limit_name
                .as_deref()
                .and_then(|name| monitored.limit(name))
        };
        if let Some(limit) = contingency_limit.or_else(|| monitored.limit(&selection.limit_name)) {
            return Some(PairLimit::Thermal(limit));
        }
    }
    match network.controllable(&key.element) {
        Some(element) if element.kind == ControlKind::Hvdc => Some(PairLimit::Power {
            min: element.min,
            max: element.max,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sco_core::{ControllableElement, MonitoredElement, SensitivityEntry};

    fn network() -> NetworkModel {
        let mut network = NetworkModel::new();
        network
            .add_controllable(
                ControllableElement::new("HVDC_1", ControlKind::Hvdc, -500.0, 500.0, 100.0).unwrap(),
            )
            .unwrap();
        network
            .add_monitored(
                MonitoredElement::new("LINE_A")
                    .with_limit(PERMANENT_LIMIT, 100.0)
                    .with_limit("TATL", 120.0),
            )
            .unwrap();
        network.add_monitored(MonitoredElement::new("LINE_NOLIM")).unwrap();
        network
    }

    #[test]
    fn test_classifies_pairs() {
        let mut network = network();
        let out = Contingency::parse("OUT_1");
        network.add_sensitivity(SensitivityEntry::reference_flow("LINE_A", Contingency::Basecase, 90.0));
        network.add_sensitivity(SensitivityEntry::coefficient("LINE_A", Contingency::Basecase, "HVDC_1", 0.5));
        network.add_sensitivity(SensitivityEntry::reference_flow("HVDC_1", out.clone(), 10.0));
        network.add_sensitivity(SensitivityEntry::reference_flow("LINE_NOLIM", out.clone(), 10.0));
        network.add_sensitivity(SensitivityEntry::coefficient("LINE_NOLIM", out.clone(), "HVDC_1", 0.1));

        let index = SensitivityIndex::build(&network, &LimitSelection::default()).unwrap();
        assert_eq!(index.quad_pairs().count(), 1);
        assert_eq!(index.hvdc_pairs().count(), 1);
        assert_eq!(index.pair_count(), 2);
        assert_eq!(index.unlimited_elements().collect::<Vec<_>>(), vec!["LINE_NOLIM"]);
        assert_eq!(index.diagnostics().issues_by_category("limits").count(), 1);

        let a = PairKey::new("LINE_A", Contingency::Basecase);
        assert_eq!(index.limit(&a), Some(PairLimit::Thermal(100.0)));
        assert_eq!(index.coefficient(&a, "HVDC_1"), 0.5);
        assert_eq!(index.coefficient(&a, "PST_MISSING"), 0.0);
        assert_eq!(
            index.limit(&PairKey::new("HVDC_1", out)),
            Some(PairLimit::Power { min: -500.0, max: 500.0 })
        );
    }

    #[test]
    fn test_missing_reference_flow_is_fatal() {
        let mut network = network();
        network.add_sensitivity(SensitivityEntry::coefficient("LINE_A", Contingency::Basecase, "HVDC_1", 0.5));
        let err = SensitivityIndex::build(&network, &LimitSelection::default()).unwrap_err();
        assert!(matches!(err, SecurityError::DataIntegrity(_)));
    }

    #[test]
    fn test_duplicate_reference_flow_is_fatal() {
        let mut network = network();
        network.add_sensitivity(SensitivityEntry::reference_flow("LINE_A", Contingency::Basecase, 90.0));
        network.add_sensitivity(SensitivityEntry::reference_flow("LINE_A", Contingency::Basecase, 91.0));
        let err = SensitivityIndex::build(&network, &LimitSelection::default()).unwrap_err();
        assert!(matches!(err, SecurityError::DataIntegrity(_)));
    }

    #[test]
    fn test_contingency_limit_selection() {
        let mut network = network();
        let out = Contingency::parse("OUT_1");
        network.add_sensitivity(SensitivityEntry::reference_flow("LINE_A", Contingency::Basecase, 90.0));
        network.add_sensitivity(SensitivityEntry::reference_flow("LINE_A", out.clone(), 90.0));

        let selection = LimitSelection {
            limit_name: PERMANENT_LIMIT.to_string(),
            contingency_limit_name: Some("TATL".to_string()),
        };
        let index = SensitivityIndex::build(&network, &selection).unwrap();
        assert_eq!(
            index.limit(&PairKey::new("LINE_A", Contingency::Basecase)),
            Some(PairLimit::Thermal(100.0))
        );
        assert_eq!(
            index.limit(&PairKey::new("LINE_A", out)),
            Some(PairLimit::Thermal(120.0))
        );
    }

    #[test]
    fn test_unknown_driver_is_diagnosed() {
        let mut network = network();
        network.add_sensitivity(SensitivityEntry::reference_flow("LINE_A", Contingency::Basecase, 90.0));
        network.add_sensitivity(SensitivityEntry::coefficient("LINE_A", Contingency::Basecase, "GHOST", 1.0));
        let index = SensitivityIndex::build(&network, &LimitSelection::default()).unwrap();
        assert_eq!(index.diagnostics().issues_by_category("drivers").count(), 1);
        assert_eq!(index.pair_count(), 1);
    }
}
