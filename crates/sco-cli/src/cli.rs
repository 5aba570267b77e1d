use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Optimize HVDC / PST setpoints against every contingency of a sensitivity document
    Optimize(OptimizeArgs),
    /// Summarize a sensitivity document and report import diagnostics
    Inspect {
        /// Path to the sensitivity document (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = InspectFormat::Plain)]
        format: InspectFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
pub struct OptimizeArgs {
    /// Path to the sensitivity document (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,
    /// Session configuration (TOML); flags below override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Write the sweep records (label -> objective, margin, setpoints) as JSON
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
    /// Write realized flows (contingency -> element -> flow) as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub flows: Option<PathBuf>,
    /// Write the sweep table as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub csv: Option<PathBuf>,
    /// Write the full session report (restoration triage, diagnostics) as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub report: Option<PathBuf>,
    /// Factor applied to thermal limits
    #[arg(long)]
    pub ist_margin: Option<f64>,
    /// LP solver (clarabel, highs)
    #[arg(long)]
    pub solver: Option<String>,
    /// HVDCs to optimize (comma separated); default all
    #[arg(long, value_delimiter = ',')]
    pub hvdc: Option<Vec<String>>,
    /// PSTs to optimize (comma separated); default all
    #[arg(long, value_delimiter = ',')]
    pub pst: Option<Vec<String>>,
    /// Elements with a curative post-contingency setpoint (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub curative: Option<Vec<String>>,
    /// Stop after feasibility restoration; skip the boundary sweep
    #[arg(long)]
    pub restore_only: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum InspectFormat {
    Plain,
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
