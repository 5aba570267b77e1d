//! Document inspection: element counts, constrained pairs, import issues.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use sco_algo::{LimitSelection, SensitivityIndex};
use sco_cli::cli::InspectFormat;
use sco_core::{Diagnostics, ImportStats};
use sco_io::parse_document;
use serde::Serialize;
use tabwriter::TabWriter;

#[derive(Debug, Serialize)]
struct InspectReport {
    stats: ImportStats,
    constrained_pairs: usize,
    unlimited_elements: Vec<String>,
    diagnostics: Diagnostics,
}

pub fn handle(input: &Path, format: InspectFormat) -> Result<()> {
    let imported = parse_document(input)?;
    let validity = imported.ensure_valid();
    let index = SensitivityIndex::build(&imported.network, &LimitSelection::default())
        .with_context(|| format!("indexing sensitivities of '{}'", input.display()))?;

    let mut diagnostics = imported.diagnostics.diagnostics;
    diagnostics.merge(index.diagnostics().clone());
    let report = InspectReport {
        stats: imported.diagnostics.stats,
        constrained_pairs: index.pair_count(),
        unlimited_elements: index.unlimited_elements().map(String::from).collect(),
        diagnostics,
    };

    match format {
        InspectFormat::Plain => print_report(&report)?,
        InspectFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    validity.with_context(|| format!("'{}' is not usable as is", input.display()))
}

fn print_report(report: &InspectReport) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "ITEM\tCOUNT")?;
    writeln!(writer, "hvdc\t{}", report.stats.hvdcs)?;
    writeln!(writer, "pst\t{}", report.stats.psts)?;
    writeln!(writer, "counter-trading\t{}", report.stats.counter_trading)?;
    writeln!(writer, "monitored\t{}", report.stats.monitored)?;
    writeln!(writer, "sensitivity entries\t{}", report.stats.sensitivity_entries)?;
    writeln!(writer, "contingencies\t{}", report.stats.contingencies)?;
    writeln!(writer, "constrained pairs\t{}", report.constrained_pairs)?;
    writer.flush()?;

    if !report.unlimited_elements.is_empty() {
        println!(
            "Unconstrained (no limit): {}",
            report.unlimited_elements.join(", ")
        );
    }
    if report.diagnostics.has_issues() {
        println!("Diagnostics: {}", report.diagnostics.summary());
        for issue in &report.diagnostics.issues {
            println!("  {issue}");
        }
    }
    Ok(())
}
