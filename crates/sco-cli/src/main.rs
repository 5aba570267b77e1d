use anyhow::{Context, Result};
use clap::Parser;
use sco_cli::cli::{build_cli_command, Cli, Commands};
use tracing::debug;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    debug!("sco {} starting", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Some(Commands::Optimize(args)) => commands::optimize::handle(args),
        Some(Commands::Inspect { input, format }) => commands::inspect::handle(input, *format),
        Some(Commands::Completions { shell, out }) => {
            commands::completions::handle(*shell, out.as_deref())
        }
        None => {
            build_cli_command().print_help()?;
            println!();
            Ok(())
        }
    }
}
