//! Input document importers.

mod document;

pub use document::{load_network, parse_document, parse_document_str};

use anyhow::{bail, Result};
use sco_core::{ImportDiagnostics, NetworkModel, Severity};
use serde_json::Value;

/// Network plus everything learned while importing it.
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub network: NetworkModel,
    pub diagnostics: ImportDiagnostics,
    /// Free-form `situationDescription` block, passed through untouched
    pub situation: Option<Value>,
}

impl ImportResult {
    /// Fail when any definition was rejected during import.
    ///
    /// A skipped controllable would otherwise be held at reference without
    /// notice, so callers that optimize must refuse such a network.
    pub fn ensure_valid(&self) -> Result<()> {
        let diagnostics = &self.diagnostics.diagnostics;
        if !diagnostics.has_errors() {
            return Ok(());
        }
        let issues: Vec<String> = diagnostics
            .issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
            .map(|issue| issue.to_string())
            .collect();
        bail!(
            "document has {} invalid definition(s):\n  {}",
            issues.len(),
            issues.join("\n  ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_valid_lists_rejected_elements() {
        let result = parse_document_str(
            r#"{"elemVars": {"hvdc": {
                "HVDC_OK":  {"min": -500, "max": 500, "referenceSetpoint": 0},
                "HVDC_BAD": {"min": -500, "max": 500, "referenceSetpoint": 600}
            }}}"#,
        )
        .unwrap();
        let err = result.ensure_valid().unwrap_err().to_string();
        assert!(err.contains("1 invalid definition"));
        assert!(err.contains("HVDC_BAD"));
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let result = parse_document_str(
            r#"{"counterTrading": {"CT_IDLE": {"min": 0, "max": 0}}}"#,
        )
        .unwrap();
        assert!(result.diagnostics.diagnostics.has_issues());
        assert!(result.ensure_valid().is_ok());
    }
}
