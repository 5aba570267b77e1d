use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use sco_algo::security::{write_csv, write_json};
use sco_algo::{ScenarioResult, SetpointOptimizer};
use sco_cli::{cli::OptimizeArgs, config::resolve_config};
use sco_io::parse_document;
use tabwriter::TabWriter;
use tracing::info;

pub fn handle(args: &OptimizeArgs) -> Result<()> {
    let imported = parse_document(&args.input)?;
    imported
        .ensure_valid()
        .with_context(|| format!("refusing to optimize '{}'", args.input.display()))?;
    let config = resolve_config(args)?;
    let stats = &imported.diagnostics.stats;
    println!(
        "Loaded {} HVDC, {} PST, {} monitored elements over {} contingencies",
        stats.hvdcs, stats.psts, stats.monitored, stats.contingencies
    );

    let optimizer = SetpointOptimizer::new(&imported.network, config);
    let start = Instant::now();

    if args.restore_only {
        let restoration = optimizer.restore().context("restoring feasibility")?;
        let report = &restoration.report;
        println!(
            "Outcome: {:?}, probe margin {:.3}, {} hardened, {} problematic",
            report.outcome,
            report.probe_margin,
            report.hardened.len(),
            report.triage.len()
        );
        if let Some(path) = &args.report {
            write_json(report, path)?;
            println!("Restoration report written to {}", path.display());
        }
        return Ok(());
    }

    let mut result = optimizer.run().context("optimizing setpoints")?;
    let mut diagnostics = imported.diagnostics.diagnostics;
    diagnostics.merge(result.diagnostics);
    result.diagnostics = diagnostics;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "optimize finished"
    );

    print!("{}", result.summary());
    print_scenarios(&result.scenarios)?;

    if let Some(path) = &args.out {
        write_json(&result.scenarios, path)?;
        println!("Scenarios written to {}", path.display());
    }
    if let Some(path) = &args.flows {
        write_json(&result.flows, path)?;
        println!("Flows written to {}", path.display());
    }
    if let Some(path) = &args.csv {
        write_csv(&result.scenarios, path)?;
        println!("Sweep table written to {}", path.display());
    }
    if let Some(path) = &args.report {
        write_json(&result, path)?;
        println!("Session report written to {}", path.display());
    }
    Ok(())
}

fn print_scenarios(scenarios: &BTreeMap<String, ScenarioResult>) -> Result<()> {
    let elements: Vec<&str> = scenarios
        .values()
        .next()
        .map(|s| s.setpoints.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut writer = TabWriter::new(io::stdout());
    write!(writer, "LABEL\tOBJECTIVE\tMIN MARGIN")?;
    for id in &elements {
        write!(writer, "\t{id}")?;
    }
    writeln!(writer)?;
    for (label, scenario) in scenarios {
        write!(
            writer,
            "{}\t{:.3}\t{:.3}",
            label, scenario.objective, scenario.minimum_margin
        )?;
        for id in &elements {
            match scenario.setpoints.get(*id) {
                Some(value) => write!(writer, "\t{value:.3}")?,
                None => write!(writer, "\t-")?,
            }
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
