//! Session configuration for `sco optimize`.
//!
//! A TOML file mirrors [`OptimizationConfig`] field for field; every key is
//! optional:
//!
//! ```toml
//! ist_margin = 0.95
//! limit_name = "permanent_limit"
//! contingency_limit_name = "TATL_600"
//! hvdc = ["HVDC_1"]
//! curative_elements = ["PST_1"]
//! solver = "clarabel"
//! ```

use crate::cli::OptimizeArgs;
use anyhow::{Context, Result};
use sco_algo::OptimizationConfig;
use std::fs;
use std::path::Path;

/// Load a session configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<OptimizationConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config '{}'", path.display()))?;
    let config: OptimizationConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing config '{}'", path.display()))?;
    Ok(config)
}

/// Apply command-line flags on top of a loaded configuration.
pub fn apply_overrides(
    mut config: OptimizationConfig,
    args: &OptimizeArgs,
) -> Result<OptimizationConfig> {
    if let Some(margin) = args.ist_margin {
        config.ist_margin = margin;
    }
    if let Some(solver) = &args.solver {
        config.solver = solver.parse()?;
    }
    if let Some(hvdc) = &args.hvdc {
        config.hvdc = Some(non_empty(hvdc));
    }
    if let Some(pst) = &args.pst {
        config.pst = Some(non_empty(pst));
    }
    if let Some(curative) = &args.curative {
        config.curative_elements = non_empty(curative);
    }
    Ok(config)
}

/// Config file (or defaults) plus flag overrides, validated.
pub fn resolve_config(args: &OptimizeArgs) -> Result<OptimizationConfig> {
    let base = match &args.config {
        Some(path) => load_config(path)?,
        None => OptimizationConfig::default(),
    };
    let config = apply_overrides(base, args)?;
    config.validate()?;
    Ok(config)
}

fn non_empty(ids: &[String]) -> Vec<String> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}
