use super::SecurityError;
use crate::lp::LpSolverKind;
use sco_core::{ControlKind, PERMANENT_LIMIT};
use serde::{Deserialize, Serialize};

/// Session parameters.
///
/// Element selections left as `None` optimize every element of that kind;
/// an explicit list optimizes only those and holds the rest at reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Factor applied to thermal limits of monitored lines
    #[serde(default = "default_ist_margin")]
    pub ist_margin: f64,
    /// Named limit used for base-case pairs
    #[serde(default = "default_limit_name")]
    pub limit_name: String,
    /// Named limit used for N-1 pairs, falling back to `limit_name`
    #[serde(default)]
    pub contingency_limit_name: Option<String>,
    #[serde(default)]
    pub hvdc: Option<Vec<String>>,
    #[serde(default)]
    pub pst: Option<Vec<String>>,
    #[serde(default)]
    pub counter_trading: Option<Vec<String>>,
    /// Elements that get an extra post-contingency delta per N-1 contingency
    #[serde(default)]
    pub curative_elements: Vec<String>,
    /// Upper bound on Σ|counter-trading| when set
    #[serde(default)]
    pub counter_trading_volume_cap: Option<f64>,
    #[serde(default = "default_tie_break_weight")]
    pub tie_break_weight: f64,
    #[serde(default = "default_feasibility_tolerance")]
    pub feasibility_tolerance: f64,
    #[serde(default)]
    pub solver: LpSolverKind,
}

fn default_ist_margin() -> f64 {
    1.0
}

fn default_limit_name() -> String {
    PERMANENT_LIMIT.to_string()
}

fn default_tie_break_weight() -> f64 {
    0.01
}

fn default_feasibility_tolerance() -> f64 {
    1e-6
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            ist_margin: default_ist_margin(),
            limit_name: default_limit_name(),
            contingency_limit_name: None,
            hvdc: None,
            pst: None,
            counter_trading: None,
            curative_elements: Vec::new(),
            counter_trading_volume_cap: None,
            tie_break_weight: default_tie_break_weight(),
            feasibility_tolerance: default_feasibility_tolerance(),
            solver: LpSolverKind::default(),
        }
    }
}

impl OptimizationConfig {
    pub fn selection(&self, kind: ControlKind) -> Option<&[String]> {
        match kind {
            ControlKind::Hvdc => self.hvdc.as_deref(),
            ControlKind::Pst => self.pst.as_deref(),
        }
    }

    pub fn validate(&self) -> Result<(), SecurityError> {
        if !(self.ist_margin.is_finite() && self.ist_margin > 0.0) {
            return Err(SecurityError::Config(format!(
                "ist_margin must be a positive number, got {}",
                self.ist_margin
            )));
        }
        if !(self.feasibility_tolerance.is_finite() && self.feasibility_tolerance >= 0.0) {
            return Err(SecurityError::Config(format!(
                "feasibility_tolerance must be non-negative, got {}",
                self.feasibility_tolerance
            )));
        }
        if !(self.tie_break_weight.is_finite() && self.tie_break_weight >= 0.0) {
            return Err(SecurityError::Config(format!(
                "tie_break_weight must be non-negative, got {}",
                self.tie_break_weight
            )));
        }
        if let Some(cap) = self.counter_trading_volume_cap {
            if !(cap.is_finite() && cap >= 0.0) {
                return Err(SecurityError::Config(format!(
                    "counter_trading_volume_cap must be non-negative, got {cap}"
                )));
            }
        }
        if self.limit_name.trim().is_empty() {
            return Err(SecurityError::Config("limit_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: OptimizationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, OptimizationConfig::default());
        assert_eq!(config.ist_margin, 1.0);
        assert_eq!(config.limit_name, "permanent_limit");
        assert_eq!(config.tie_break_weight, 0.01);
        assert!(config.selection(ControlKind::Hvdc).is_none());
    }

    #[test]
    fn test_partial_document() {
        let config: OptimizationConfig =
            serde_json::from_str(r#"{"ist_margin": 0.9, "pst": ["PST_1"], "solver": "clarabel"}"#)
                .unwrap();
        assert_eq!(config.ist_margin, 0.9);
        assert_eq!(config.selection(ControlKind::Pst), Some(&["PST_1".to_string()][..]));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = OptimizationConfig::default();
        assert!(config.validate().is_ok());

        config.ist_margin = 0.0;
        assert!(matches!(config.validate(), Err(SecurityError::Config(_))));

        let config = OptimizationConfig {
            counter_trading_volume_cap: Some(-1.0),
            ..OptimizationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
