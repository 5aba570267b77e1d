//! Session results and their export.

use super::{RestorationOutcome, RestorationReport, SecurityError, SecurityModel, MAX_MARGIN_LABEL};
use crate::lp::LpSolution;
use anyhow::{Context, Result};
use sco_core::{Contingency, Diagnostics};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Points closer than this fraction of the boundary extent are merged.
const BOUNDARY_MERGE_FRACTION: f64 = 1e-4;

/// Outcome of one named solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    /// Objective value of the solve
    pub objective: f64,
    /// Worst realized margin over every constrained pair
    pub minimum_margin: f64,
    /// Absolute setpoint of every optimized element
    pub setpoints: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub curative_setpoints: BTreeMap<Contingency, BTreeMap<String, f64>>,
}

impl ScenarioResult {
    pub fn from_solution(model: &SecurityModel, solution: &LpSolution) -> Self {
        Self {
            objective: solution.objective_value,
            minimum_margin: model.worst_margin(solution),
            setpoints: model.setpoints(solution),
            curative_setpoints: model.curative_setpoints(solution),
        }
    }
}

/// A sweep point projected on two elements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// Everything one optimization session produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    /// Backend that produced the solves
    pub solver: String,
    pub restoration: RestorationReport,
    /// Sweep records keyed by objective label
    pub scenarios: BTreeMap<String, ScenarioResult>,
    /// Realized flows at the margin-maximizing point: contingency -> element -> flow
    pub flows: BTreeMap<Contingency, BTreeMap<String, f64>>,
    pub diagnostics: Diagnostics,
}

impl SessionResult {
    /// Record of the final true-margin solve.
    pub fn max_margin(&self) -> Option<&ScenarioResult> {
        self.scenarios.get(MAX_MARGIN_LABEL)
    }

    /// Elements whose setpoints appear in the sweep records.
    pub fn elements(&self) -> BTreeSet<&str> {
        self.scenarios
            .values()
            .flat_map(|s| s.setpoints.keys().map(String::as_str))
            .collect()
    }

    /// Sweep points in the `(x, y)` setpoint plane, deduplicated and sorted by
    /// angle around their centroid. The `max_margin` point is interior and is
    /// left out.
    pub fn boundary(&self, x: &str, y: &str) -> Result<Vec<BoundaryPoint>, SecurityError> {
        for axis in [x, y] {
            if !self.elements().contains(axis) {
                return Err(SecurityError::Config(format!(
                    "'{axis}' is not an optimized element of this session"
                )));
            }
        }
        let points: Vec<BoundaryPoint> = self
            .scenarios
            .iter()
            .filter(|(label, _)| label.as_str() != MAX_MARGIN_LABEL)
            .filter_map(|(label, s)| {
                Some(BoundaryPoint {
                    label: label.clone(),
                    x: *s.setpoints.get(x)?,
                    y: *s.setpoints.get(y)?,
                })
            })
            .collect();
        Ok(sort_by_angle(points))
    }

    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Setpoint Optimization Summary\n{}\n", "=".repeat(40)));
        s.push_str(&format!("Solver: {}\n", self.solver));
        s.push_str(&format!(
            "Outcome: {}\n",
            match self.restoration.outcome {
                RestorationOutcome::Satisfied => "all contingencies secured",
                RestorationOutcome::Restored => "restored (some contingencies relaxed)",
            }
        ));
        s.push_str(&format!("Probe margin: {:.3}\n", self.restoration.probe_margin));
        if let Some(best) = self.max_margin() {
            s.push_str(&format!("Max margin: {:.3}\n", best.minimum_margin));
        }
        s.push_str(&format!(
            "Hardened contingencies: {}\n",
            self.restoration.hardened.len()
        ));
        for triage in &self.restoration.triage {
            s.push_str(&format!(
                "  [{}] {} overloaded: {} (relief margin {:.3})\n",
                if triage.resolvable { "RESOLVABLE" } else { "UNRESOLVED" },
                triage.contingency,
                triage.overloaded_elements.join(", "),
                triage.best_relief_margin
            ));
        }
        s.push_str(&format!("Scenarios: {}\n", self.scenarios.len()));
        if self.diagnostics.has_issues() {
            s.push_str(&format!("Diagnostics: {}\n", self.diagnostics.summary()));
        }
        s
    }
}

fn sort_by_angle(points: Vec<BoundaryPoint>) -> Vec<BoundaryPoint> {
    if points.is_empty() {
        return points;
    }
    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(a, b, c, d), p| (a.min(p.x), b.max(p.x), c.min(p.y), d.max(p.y)),
    );
    let extent = (max_x - min_x).hypot(max_y - min_y).max(1.0);
    let merge = BOUNDARY_MERGE_FRACTION * extent;

    let mut unique: Vec<BoundaryPoint> = Vec::with_capacity(points.len());
    for point in points {
        let seen = unique
            .iter()
            .any(|u| (u.x - point.x).abs() <= merge && (u.y - point.y).abs() <= merge);
        if !seen {
            unique.push(point);
        }
    }

    let n = unique.len() as f64;
    let cx = unique.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = unique.iter().map(|p| p.y).sum::<f64>() / n;
    unique.sort_by(|a, b| {
        let ta = (a.y - cy).atan2(a.x - cx);
        let tb = (b.y - cy).atan2(b.x - cx);
        ta.total_cmp(&tb)
    });
    unique
}

/// Write any serializable result as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating JSON output '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("writing JSON output '{}'", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Write the sweep table: one row per label, one column per element.
pub fn write_csv(scenarios: &BTreeMap<String, ScenarioResult>, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating CSV output '{}'", path.display()))?;
    write_csv_to(scenarios, file).with_context(|| format!("writing CSV output '{}'", path.display()))
}

fn write_csv_to<W: Write>(scenarios: &BTreeMap<String, ScenarioResult>, sink: W) -> Result<()> {
    let elements: BTreeSet<&str> = scenarios
        .values()
        .flat_map(|s| s.setpoints.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(sink);
    let mut header = vec!["label", "objective", "minimum_margin"];
    header.extend(elements.iter().copied());
    writer.write_record(&header)?;

    for (label, scenario) in scenarios {
        let mut record = vec![
            label.clone(),
            scenario.objective.to_string(),
            scenario.minimum_margin.to_string(),
        ];
        record.extend(elements.iter().map(|id| {
            scenario
                .setpoints
                .get(*id)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(objective: f64, setpoints: &[(&str, f64)]) -> ScenarioResult {
        ScenarioResult {
            objective,
            minimum_margin: 1.0,
            setpoints: setpoints.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            curative_setpoints: BTreeMap::new(),
        }
    }

    fn session(scenarios: BTreeMap<String, ScenarioResult>) -> SessionResult {
        SessionResult {
            solver: "clarabel".into(),
            restoration: RestorationReport {
                outcome: RestorationOutcome::Satisfied,
                probe_margin: 1.0,
                triage: Vec::new(),
                relief: BTreeMap::new(),
                hardened: vec![Contingency::Basecase],
            },
            scenarios,
            flows: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    #[test]
    fn test_scenario_json_shape() {
        let json = serde_json::to_value(scenario(2.0, &[("H", 1.0)])).unwrap();
        assert_eq!(json["objective"], 2.0);
        assert_eq!(json["minimumMargin"], 1.0);
        assert_eq!(json["setpoints"]["H"], 1.0);
        assert!(json.get("curativeSetpoints").is_none());
    }

    #[test]
    fn test_boundary_sorted_and_deduplicated() {
        let mut scenarios = BTreeMap::new();
        scenarios.insert("a".into(), scenario(0.0, &[("X", 1.0), ("Y", 0.0)]));
        scenarios.insert("b".into(), scenario(0.0, &[("X", 0.0), ("Y", 1.0)]));
        scenarios.insert("c".into(), scenario(0.0, &[("X", -1.0), ("Y", 0.0)]));
        scenarios.insert("d".into(), scenario(0.0, &[("X", 0.0), ("Y", -1.0)]));
        scenarios.insert("e".into(), scenario(0.0, &[("X", 1.0), ("Y", 0.0)]));
        let points = session(scenarios).boundary("X", "Y").unwrap();

        let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_boundary_unknown_axis() {
        let mut scenarios = BTreeMap::new();
        scenarios.insert("a".into(), scenario(0.0, &[("X", 1.0)]));
        assert!(session(scenarios).boundary("X", "Z").is_err());
    }

    #[test]
    fn test_csv_table() {
        let mut scenarios = BTreeMap::new();
        scenarios.insert("max_total".into(), scenario(3.0, &[("A", 1.0), ("B", 2.0)]));
        scenarios.insert("min_total".into(), scenario(-3.0, &[("A", -1.0)]));

        let mut buffer = Vec::new();
        write_csv_to(&scenarios, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "label,objective,minimum_margin,A,B");
        assert_eq!(lines[1], "max_total,3,1,1,2");
        assert_eq!(lines[2], "min_total,-3,1,-1,");
    }

    #[test]
    fn test_write_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut scenarios: BTreeMap<String, ScenarioResult> = BTreeMap::new();
        scenarios.insert("max_margin".into(), scenario(5.0, &[("A", 1.0)]));
        write_json(&scenarios, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"max_margin\""));
    }

    #[test]
    fn test_summary_mentions_outcome() {
        let mut scenarios = BTreeMap::new();
        scenarios.insert(MAX_MARGIN_LABEL.into(), scenario(5.0, &[("A", 1.0)]));
        let summary = session(scenarios).summary();
        assert!(summary.contains("all contingencies secured"));
        assert!(summary.contains("Max margin: 1.000"));
    }
}
