//! Sensitivity document importer
//!
//! Layout written by the sensitivity generator:
//!
//! ```text
//! {
//!   "sensi":    { "branch": { line: { contingency: { "referenceCurrent": F, driver: s, ... } } },
//!                 "hvdc":   { hvdc: { contingency: { ... } } } },
//!   "quads":    { line: { "permanent_limit": L, other_limit: L2, ... } },
//!   "elemVars": { "hvdc": { id: { "min", "max", "referenceSetpoint" } }, "pst": { ... } },
//!   "counterTrading":       { id: { "min", "max" } },
//!   "situationDescription": { ... }
//! }
//! ```
//!
//! `sensitivities` is accepted for `sensi`, and the sensitivity map may also
//! be flat (monitored element at the top level, no `branch`/`hvdc` split).

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use sco_core::{
    ControlKind, ControllableElement, Contingency, CounterTradingElement, ImportDiagnostics,
    ImportStats, MonitoredElement, NetworkModel, ScoResult, SensitivityEntry, PERMANENT_LIMIT,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ImportResult;

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default, alias = "sensitivities")]
    sensi: Option<Value>,
    #[serde(default)]
    quads: BTreeMap<String, Value>,
    #[serde(default, rename = "elemVars")]
    elem_vars: RawElemVars,
    #[serde(default, rename = "counterTrading", alias = "counter_trading")]
    counter_trading: BTreeMap<String, Value>,
    #[serde(default, rename = "situationDescription")]
    situation: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawElemVars {
    #[serde(default)]
    hvdc: BTreeMap<String, Value>,
    #[serde(default)]
    pst: BTreeMap<String, Value>,
    #[serde(default, rename = "counterTrading", alias = "counter_trading")]
    counter_trading: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawSetpoint {
    min: f64,
    max: f64,
    #[serde(rename = "referenceSetpoint", alias = "reference")]
    reference_setpoint: f64,
}

#[derive(Debug, Deserialize)]
struct RawBounds {
    min: f64,
    max: f64,
}

/// Parse a sensitivity document from disk.
pub fn parse_document(path: impl AsRef<Path>) -> Result<ImportResult> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sensitivity document '{}'", path.display()))?;
    parse_document_str(&content)
        .with_context(|| format!("parsing sensitivity document '{}'", path.display()))
}

/// Load a document and return the network only, refusing rejected definitions.
pub fn load_network(path: impl AsRef<Path>) -> Result<NetworkModel> {
    let path = path.as_ref();
    let result = parse_document(path)?;
    result
        .ensure_valid()
        .with_context(|| format!("validating sensitivity document '{}'", path.display()))?;
    Ok(result.network)
}

/// Parse a sensitivity document from a JSON string.
pub fn parse_document_str(content: &str) -> Result<ImportResult> {
    let raw: RawDocument = serde_json::from_str(content).context("decoding JSON")?;
    let mut diag = ImportDiagnostics::new();
    let mut network = NetworkModel::new();

    for (id, value) in &raw.elem_vars.hvdc {
        add_controllable(&mut network, &mut diag, id, ControlKind::Hvdc, value);
    }
    for (id, value) in &raw.elem_vars.pst {
        add_controllable(&mut network, &mut diag, id, ControlKind::Pst, value);
    }
    for (id, value) in raw
        .elem_vars
        .counter_trading
        .iter()
        .chain(raw.counter_trading.iter())
    {
        add_counter_trading(&mut network, &mut diag, id, value);
    }
    for (id, value) in &raw.quads {
        add_monitored(&mut network, &mut diag, id, value);
    }

    match &raw.sensi {
        Some(Value::Object(sensi)) => {
            if is_split_layout(sensi) {
                for section in ["branch", "hvdc"] {
                    match sensi.get(section) {
                        Some(Value::Object(monitored)) => {
                            add_sensitivities(&mut network, &mut diag, monitored)
                        }
                        Some(Value::Null) | None => {}
                        Some(_) => diag.diagnostics.add_error(
                            "parse",
                            &format!("sensitivity section '{section}' is not an object"),
                        ),
                    }
                }
            } else {
                add_sensitivities(&mut network, &mut diag, sensi);
            }
        }
        Some(Value::Null) | None => diag
            .diagnostics
            .add_warning("parse", "document has no sensitivity table"),
        Some(_) => return Err(anyhow!("'sensi' must be an object")),
    }

    let stats = network.stats();
    diag.stats = ImportStats {
        hvdcs: stats.hvdcs,
        psts: stats.psts,
        counter_trading: stats.counter_trading,
        monitored: stats.monitored,
        sensitivity_entries: stats.sensitivity_entries,
        contingencies: stats.contingencies,
    };

    Ok(ImportResult {
        network,
        diagnostics: diag,
        situation: raw.situation,
    })
}

fn is_split_layout(sensi: &Map<String, Value>) -> bool {
    !sensi.is_empty() && sensi.keys().all(|k| k == "branch" || k == "hvdc")
}

fn record(diag: &mut ImportDiagnostics, category: &str, id: &str, result: ScoResult<()>) {
    if let Err(err) = result {
        diag.diagnostics
            .add_error_with_entity(category, &format!("{err}; element skipped"), id);
    }
}

fn add_controllable(
    network: &mut NetworkModel,
    diag: &mut ImportDiagnostics,
    id: &str,
    kind: ControlKind,
    value: &Value,
) {
    let raw: RawSetpoint = match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(err) => {
            diag.diagnostics.add_error_with_entity(
                "elements",
                &format!("invalid {kind} definition: {err}"),
                id,
            );
            return;
        }
    };
    let result = ControllableElement::new(id, kind, raw.min, raw.max, raw.reference_setpoint)
        .and_then(|element| network.add_controllable(element));
    record(diag, "elements", id, result);
}

fn add_counter_trading(
    network: &mut NetworkModel,
    diag: &mut ImportDiagnostics,
    id: &str,
    value: &Value,
) {
    let raw: RawBounds = match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(err) => {
            diag.diagnostics.add_error_with_entity(
                "counter_trading",
                &format!("invalid counter-trading definition: {err}"),
                id,
            );
            return;
        }
    };
    let result = CounterTradingElement::new(id, raw.min, raw.max).and_then(|element| {
        if element.is_inert() {
            diag.diagnostics.add_warning_with_entity(
                "counter_trading",
                "both bounds are zero; element will not be optimized",
                id,
            );
        }
        network.add_counter_trading(element)
    });
    record(diag, "counter_trading", id, result);
}

fn add_monitored(network: &mut NetworkModel, diag: &mut ImportDiagnostics, id: &str, value: &Value) {
    let Value::Object(limits) = value else {
        diag.diagnostics
            .add_error_with_entity("limits", "limit set is not an object; skipped", id);
        return;
    };

    let mut element = MonitoredElement::new(id);
    for (name, limit) in limits {
        match limit.as_f64() {
            Some(v) if v.is_finite() => element = element.with_limit(name.clone(), v),
            _ => diag.diagnostics.add_warning_with_entity(
                "limits",
                &format!("limit '{name}' is not a number; ignored"),
                id,
            ),
        }
    }

    if element.limit(PERMANENT_LIMIT).is_none() {
        diag.diagnostics.add_warning_with_entity(
            "limits",
            &format!("no {PERMANENT_LIMIT} defined"),
            id,
        );
    } else if let Some(previous) = element.normalize_permanent_limit() {
        let lowered = element.limit(PERMANENT_LIMIT).unwrap_or(previous);
        diag.diagnostics.add_warning_with_entity(
            "limits",
            &format!("{PERMANENT_LIMIT} {previous} exceeds another declared limit; lowered to {lowered}"),
            id,
        );
    }

    let result = network.add_monitored(element);
    record(diag, "limits", id, result);
}

fn add_sensitivities(
    network: &mut NetworkModel,
    diag: &mut ImportDiagnostics,
    monitored: &Map<String, Value>,
) {
    for (element, contingencies) in monitored {
        let Value::Object(contingencies) = contingencies else {
            diag.diagnostics.add_error_with_entity(
                "parse",
                "contingency map is not an object; skipped",
                element,
            );
            continue;
        };
        for (label, drivers) in contingencies {
            let Value::Object(drivers) = drivers else {
                diag.diagnostics.add_error_with_entity(
                    "parse",
                    &format!("driver map of contingency '{label}' is not an object; skipped"),
                    element,
                );
                continue;
            };
            let contingency = Contingency::parse(label);
            for (driver, coefficient) in drivers {
                let Some(coefficient) = coefficient.as_f64() else {
                    diag.diagnostics.add_warning_with_entity(
                        "sensitivities",
                        &format!("coefficient of '{driver}' under '{label}' is not a number; ignored"),
                        element,
                    );
                    continue;
                };
                network.add_sensitivity(SensitivityEntry {
                    monitored: element.clone(),
                    contingency: contingency.clone(),
                    driver: sco_core::Driver::parse(driver),
                    coefficient,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sco_core::Driver;

    #[test]
    fn test_flat_layout() {
        let result = parse_document_str(
            r#"{"sensi": {"LINE_A": {"N": {"referenceCurrent": 90.0, "HVDC_1": 0.5}}}}"#,
        )
        .unwrap();
        let entries = result.network.sensitivities();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.driver == Driver::ReferenceFlow && e.coefficient == 90.0));
        assert_eq!(entries[0].contingency, Contingency::Basecase);
    }

    #[test]
    fn test_split_layout_and_alias() {
        let result = parse_document_str(
            r#"{"sensitivities": {
                "branch": {"LINE_A": {"OUT": {"referenceCurrent": 1.0}}},
                "hvdc":   {"HVDC_1": {"N":   {"referenceCurrent": 2.0, "PST_1": 3.0}}}
            }}"#,
        )
        .unwrap();
        assert_eq!(result.network.sensitivities().len(), 3);
        assert_eq!(result.diagnostics.stats.contingencies, 2);
    }

    #[test]
    fn test_invalid_element_is_skipped() {
        let result = parse_document_str(
            r#"{"elemVars": {"hvdc": {
                "GOOD": {"min": -1, "max": 1, "referenceSetpoint": 0},
                "BAD":  {"min": -1, "max": 1, "referenceSetpoint": 5},
                "BROKEN": {"min": "x"}
            }}}"#,
        )
        .unwrap();
        assert_eq!(result.network.stats().hvdcs, 1);
        assert_eq!(result.diagnostics.diagnostics.error_count(), 2);
    }

    #[test]
    fn test_permanent_limit_is_normalized() {
        let result = parse_document_str(
            r#"{"quads": {"L": {"permanent_limit": 1000, "TATL_60": 800}}}"#,
        )
        .unwrap();
        let line = result.network.monitored("L").unwrap();
        assert_eq!(line.limit(PERMANENT_LIMIT), Some(800.0));
        assert_eq!(
            result.diagnostics.diagnostics.issues_by_category("limits").count(),
            1
        );
    }

    #[test]
    fn test_sensi_must_be_an_object() {
        assert!(parse_document_str(r#"{"sensi": [1, 2]}"#).is_err());
        assert!(parse_document_str("not json").is_err());
    }
}
