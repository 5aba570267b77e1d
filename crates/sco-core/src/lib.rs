//! # sco-core: network model for security-constrained setpoint optimization
//!
//! Typed, read-only representation of the data a setpoint optimization runs
//! on:
//!
//! - [`ControllableElement`]: an HVDC link or a phase-shifting transformer
//!   with physical setpoint bounds and the setpoint at which sensitivities
//!   were computed
//! - [`CounterTradingElement`]: a zero-reference cross-border trade lever
//! - [`MonitoredElement`]: an AC line with named thermal limits
//! - [`SensitivityEntry`]: one coefficient `∂flow(monitored, contingency) / ∂driver`,
//!   or the reference flow of the pair when the driver is
//!   [`Driver::ReferenceFlow`]
//!
//! Everything is keyed by string identifiers as they appear in the input
//! document and stored in ordered maps so that every downstream iteration
//! (constraint construction, triage, sweep) is deterministic.
//!
//! ```
//! use sco_core::*;
//!
//! let mut network = NetworkModel::new();
//! network
//!     .add_controllable(ControllableElement::new("HVDC_1", ControlKind::Hvdc, -500.0, 500.0, 0.0)?)?;
//! network.add_monitored(MonitoredElement::new("LINE_A").with_limit(PERMANENT_LIMIT, 100.0))?;
//! network.add_sensitivity(SensitivityEntry::reference_flow("LINE_A", Contingency::Basecase, 90.0));
//! network.add_sensitivity(SensitivityEntry::coefficient("LINE_A", Contingency::Basecase, "HVDC_1", 0.5));
//!
//! assert_eq!(network.stats().hvdcs, 1);
//! # Ok::<(), sco_core::ScoError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub mod diagnostics;
pub mod error;

pub use diagnostics::{DiagnosticIssue, Diagnostics, ImportDiagnostics, ImportStats, Severity};
pub use error::{ScoError, ScoResult};

/// Name of the thermal limit every monitored line is expected to carry.
pub const PERMANENT_LIMIT: &str = "permanent_limit";

/// Reserved driver key holding the reference flow of a (monitored, contingency) pair.
pub const REFERENCE_FLOW_KEY: &str = "referenceCurrent";

/// Kind of a controllable element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// HVDC link; setpoint in MW
    Hvdc,
    /// Phase-shifting transformer; setpoint in degrees
    Pst,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Hvdc => "hvdc",
            ControlKind::Pst => "pst",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ControlKind {
    type Err = ScoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hvdc" => Ok(ControlKind::Hvdc),
            "pst" => Ok(ControlKind::Pst),
            other => Err(ScoError::Parse(format!(
                "unknown controllable element kind '{other}' (expected hvdc or pst)"
            ))),
        }
    }
}

/// Network state a sensitivity was evaluated in.
///
/// Orders the base case before every outage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Contingency {
    /// No-outage state, labelled `N`
    Basecase,
    /// Single outage of the named element
    Outage(String),
}

impl Contingency {
    pub const BASECASE_LABEL: &'static str = "N";

    pub fn parse(label: &str) -> Self {
        if label == Self::BASECASE_LABEL {
            Contingency::Basecase
        } else {
            Contingency::Outage(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Contingency::Basecase => Self::BASECASE_LABEL,
            Contingency::Outage(name) => name,
        }
    }

    pub fn is_basecase(&self) -> bool {
        matches!(self, Contingency::Basecase)
    }
}

impl fmt::Display for Contingency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Contingency {
    fn from(label: String) -> Self {
        Contingency::parse(&label)
    }
}

impl From<Contingency> for String {
    fn from(contingency: Contingency) -> Self {
        contingency.label().to_string()
    }
}

/// What a sensitivity coefficient is taken with respect to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Driver {
    /// The pair's flow at the reference state (not a derivative)
    ReferenceFlow,
    /// A controllable or counter-trading element
    Element(String),
}

impl Driver {
    pub fn parse(key: &str) -> Self {
        if key == REFERENCE_FLOW_KEY {
            Driver::ReferenceFlow
        } else {
            Driver::Element(key.to_string())
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::ReferenceFlow => f.write_str(REFERENCE_FLOW_KEY),
            Driver::Element(id) => f.write_str(id),
        }
    }
}

fn check_finite(id: &str, label: &str, value: f64) -> ScoResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ScoError::Validation(format!(
            "{id}: {label} must be finite, got {value}"
        )))
    }
}

/// HVDC link or PST whose setpoint can be optimized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllableElement {
    pub id: String,
    pub kind: ControlKind,
    pub min: f64,
    pub max: f64,
    /// Setpoint at the state the sensitivities were computed in
    pub reference: f64,
}

impl ControllableElement {
    /// Create an element, enforcing `min ≤ reference ≤ max`.
    pub fn new(
        id: impl Into<String>,
        kind: ControlKind,
        min: f64,
        max: f64,
        reference: f64,
    ) -> ScoResult<Self> {
        let id = id.into();
        check_finite(&id, "min", min)?;
        check_finite(&id, "max", max)?;
        check_finite(&id, "reference setpoint", reference)?;
        if !(min <= reference && reference <= max) {
            return Err(ScoError::Validation(format!(
                "{kind} {id}: reference setpoint {reference} outside [{min}, {max}]"
            )));
        }
        Ok(Self {
            id,
            kind,
            min,
            max,
            reference,
        })
    }

    /// Admissible range of the deviation from the reference setpoint.
    pub fn delta_bounds(&self) -> (f64, f64) {
        (self.min - self.reference, self.max - self.reference)
    }

    pub fn band_width(&self) -> f64 {
        self.max - self.min
    }
}

/// Counter-trading lever, defined as a deviation from the initial dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterTradingElement {
    pub id: String,
    pub min: f64,
    pub max: f64,
}

impl CounterTradingElement {
    /// Create an element, enforcing `min ≤ 0 ≤ max`.
    pub fn new(id: impl Into<String>, min: f64, max: f64) -> ScoResult<Self> {
        let id = id.into();
        check_finite(&id, "min", min)?;
        check_finite(&id, "max", max)?;
        if !(min <= 0.0 && 0.0 <= max) {
            return Err(ScoError::Validation(format!(
                "counter-trading {id}: bounds [{min}, {max}] must contain 0"
            )));
        }
        Ok(Self { id, min, max })
    }

    pub fn reference(&self) -> f64 {
        0.0
    }

    /// Both bounds are exactly zero: the element cannot move.
    pub fn is_inert(&self) -> bool {
        self.min == 0.0 && self.max == 0.0
    }
}

/// Unit of a monitored quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowUnit {
    /// AC line current
    #[default]
    Amperes,
    /// Active power of an AC-emulated HVDC
    Megawatts,
}

/// AC line (or AC-emulated HVDC) with named thermal limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoredElement {
    pub id: String,
    pub limits: BTreeMap<String, f64>,
    pub unit: FlowUnit,
}

impl MonitoredElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, name: impl Into<String>, value: f64) -> Self {
        self.limits.insert(name.into(), value);
        self
    }

    pub fn with_unit(mut self, unit: FlowUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn limit(&self, name: &str) -> Option<f64> {
        self.limits.get(name).copied()
    }

    /// Lower `permanent_limit` to the smallest declared limit.
    ///
    /// Returns the previous value when it was lowered.
    pub fn normalize_permanent_limit(&mut self) -> Option<f64> {
        let min_limit = self.limits.values().copied().fold(f64::INFINITY, f64::min);
        match self.limits.get_mut(PERMANENT_LIMIT) {
            Some(permanent) if *permanent > min_limit => {
                let previous = *permanent;
                *permanent = min_limit;
                Some(previous)
            }
            _ => None,
        }
    }
}

/// One row of the raw sensitivity table.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityEntry {
    pub monitored: String,
    pub contingency: Contingency,
    pub driver: Driver,
    pub coefficient: f64,
}

impl SensitivityEntry {
    pub fn reference_flow(monitored: impl Into<String>, contingency: Contingency, flow: f64) -> Self {
        Self {
            monitored: monitored.into(),
            contingency,
            driver: Driver::ReferenceFlow,
            coefficient: flow,
        }
    }

    pub fn coefficient(
        monitored: impl Into<String>,
        contingency: Contingency,
        driver: impl Into<String>,
        coefficient: f64,
    ) -> Self {
        Self {
            monitored: monitored.into(),
            contingency,
            driver: Driver::Element(driver.into()),
            coefficient,
        }
    }
}

/// Element counts of a network model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub hvdcs: usize,
    pub psts: usize,
    pub counter_trading: usize,
    pub monitored: usize,
    pub sensitivity_entries: usize,
    pub contingencies: usize,
}

/// Everything an optimization session reads. Built once, then read-only.
#[derive(Debug, Clone, Default)]
pub struct NetworkModel {
    controllables: BTreeMap<String, ControllableElement>,
    counter_trading: BTreeMap<String, CounterTradingElement>,
    monitored: BTreeMap<String, MonitoredElement>,
    sensitivities: Vec<SensitivityEntry>,
}

impl NetworkModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unique_driver(&self, id: &str) -> ScoResult<()> {
        if self.controllables.contains_key(id) || self.counter_trading.contains_key(id) {
            return Err(ScoError::Validation(format!(
                "element id '{id}' is defined more than once"
            )));
        }
        Ok(())
    }

    pub fn add_controllable(&mut self, element: ControllableElement) -> ScoResult<()> {
        self.ensure_unique_driver(&element.id)?;
        self.controllables.insert(element.id.clone(), element);
        Ok(())
    }

    pub fn add_counter_trading(&mut self, element: CounterTradingElement) -> ScoResult<()> {
        self.ensure_unique_driver(&element.id)?;
        self.counter_trading.insert(element.id.clone(), element);
        Ok(())
    }

    pub fn add_monitored(&mut self, element: MonitoredElement) -> ScoResult<()> {
        if self.monitored.contains_key(&element.id) {
            return Err(ScoError::Validation(format!(
                "monitored element '{}' is defined more than once",
                element.id
            )));
        }
        self.monitored.insert(element.id.clone(), element);
        Ok(())
    }

    pub fn add_sensitivity(&mut self, entry: SensitivityEntry) {
        self.sensitivities.push(entry);
    }

    pub fn controllable(&self, id: &str) -> Option<&ControllableElement> {
        self.controllables.get(id)
    }

    pub fn counter_trading_element(&self, id: &str) -> Option<&CounterTradingElement> {
        self.counter_trading.get(id)
    }

    pub fn monitored(&self, id: &str) -> Option<&MonitoredElement> {
        self.monitored.get(id)
    }

    pub fn controllables(&self) -> impl Iterator<Item = &ControllableElement> {
        self.controllables.values()
    }

    pub fn controllables_of(&self, kind: ControlKind) -> impl Iterator<Item = &ControllableElement> {
        self.controllables.values().filter(move |e| e.kind == kind)
    }

    pub fn counter_trading(&self) -> impl Iterator<Item = &CounterTradingElement> {
        self.counter_trading.values()
    }

    pub fn monitored_elements(&self) -> impl Iterator<Item = &MonitoredElement> {
        self.monitored.values()
    }

    pub fn sensitivities(&self) -> &[SensitivityEntry] {
        &self.sensitivities
    }

    /// Setpoint a driver sits at in the reference state.
    pub fn reference_setpoint(&self, driver: &str) -> Option<f64> {
        self.controllables
            .get(driver)
            .map(|e| e.reference)
            .or_else(|| self.counter_trading.get(driver).map(|e| e.reference()))
    }

    /// All contingencies that appear in the sensitivity table.
    pub fn contingencies(&self) -> BTreeSet<Contingency> {
        self.sensitivities
            .iter()
            .map(|e| e.contingency.clone())
            .collect()
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            hvdcs: self.controllables_of(ControlKind::Hvdc).count(),
            psts: self.controllables_of(ControlKind::Pst).count(),
            counter_trading: self.counter_trading.len(),
            monitored: self.monitored.len(),
            sensitivity_entries: self.sensitivities.len(),
            contingencies: self.contingencies().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contingency_parse_and_order() {
        assert_eq!(Contingency::parse("N"), Contingency::Basecase);
        assert_eq!(
            Contingency::parse("LINE_X"),
            Contingency::Outage("LINE_X".into())
        );
        // Base case sorts first
        assert!(Contingency::Basecase < Contingency::Outage("A".into()));
        assert_eq!(Contingency::Basecase.to_string(), "N");
    }

    #[test]
    fn test_contingency_serde_as_string() {
        let json = serde_json::to_string(&Contingency::Outage("L1".into())).unwrap();
        assert_eq!(json, "\"L1\"");
        let parsed: Contingency = serde_json::from_str("\"N\"").unwrap();
        assert!(parsed.is_basecase());
    }

    #[test]
    fn test_driver_parse_reserved_key() {
        assert_eq!(Driver::parse(REFERENCE_FLOW_KEY), Driver::ReferenceFlow);
        assert_eq!(Driver::parse("PST_1"), Driver::Element("PST_1".into()));
    }

    #[test]
    fn test_controllable_reference_outside_bounds() {
        let err = ControllableElement::new("HVDC_1", ControlKind::Hvdc, -100.0, 100.0, 150.0)
            .unwrap_err();
        assert!(matches!(err, ScoError::Validation(_)));
    }

    #[test]
    fn test_controllable_delta_bounds() {
        let pst = ControllableElement::new("PST_1", ControlKind::Pst, -10.0, 10.0, 4.0).unwrap();
        assert_eq!(pst.delta_bounds(), (-14.0, 6.0));
        assert_eq!(pst.band_width(), 20.0);
    }

    #[test]
    fn test_counter_trading_must_contain_zero() {
        assert!(CounterTradingElement::new("CT", 10.0, 20.0).is_err());
        let ct = CounterTradingElement::new("CT", 0.0, 0.0).unwrap();
        assert!(ct.is_inert());
        let ct = CounterTradingElement::new("CT", 0.0, 50.0).unwrap();
        assert!(!ct.is_inert());
        assert_eq!(ct.reference(), 0.0);
    }

    #[test]
    fn test_normalize_permanent_limit() {
        let mut line = MonitoredElement::new("L")
            .with_limit(PERMANENT_LIMIT, 1000.0)
            .with_limit("TATL_600", 800.0);
        assert_eq!(line.normalize_permanent_limit(), Some(1000.0));
        assert_eq!(line.limit(PERMANENT_LIMIT), Some(800.0));
        assert_eq!(line.normalize_permanent_limit(), None);
    }

    #[test]
    fn test_duplicate_driver_ids_rejected() {
        let mut network = NetworkModel::new();
        network
            .add_controllable(
                ControllableElement::new("X", ControlKind::Hvdc, -1.0, 1.0, 0.0).unwrap(),
            )
            .unwrap();
        let err = network
            .add_counter_trading(CounterTradingElement::new("X", -1.0, 1.0).unwrap())
            .unwrap_err();
        assert!(matches!(err, ScoError::Validation(_)));
    }

    #[test]
    fn test_stats_and_lookup() {
        let mut network = NetworkModel::new();
        network
            .add_controllable(
                ControllableElement::new("H", ControlKind::Hvdc, -5.0, 5.0, 1.0).unwrap(),
            )
            .unwrap();
        network
            .add_controllable(
                ControllableElement::new("P", ControlKind::Pst, -5.0, 5.0, 0.0).unwrap(),
            )
            .unwrap();
        network
            .add_counter_trading(CounterTradingElement::new("CT", -5.0, 5.0).unwrap())
            .unwrap();
        network
            .add_monitored(MonitoredElement::new("L").with_limit(PERMANENT_LIMIT, 10.0))
            .unwrap();
        network.add_sensitivity(SensitivityEntry::reference_flow("L", Contingency::Basecase, 1.0));
        network.add_sensitivity(SensitivityEntry::reference_flow(
            "L",
            Contingency::parse("OUT"),
            2.0,
        ));

        let stats = network.stats();
        assert_eq!(stats.hvdcs, 1);
        assert_eq!(stats.psts, 1);
        assert_eq!(stats.counter_trading, 1);
        assert_eq!(stats.contingencies, 2);
        assert_eq!(network.reference_setpoint("H"), Some(1.0));
        assert_eq!(network.reference_setpoint("CT"), Some(0.0));
        assert_eq!(network.reference_setpoint("missing"), None);
    }
}
