pub mod cli;
pub mod config;

pub use cli::{build_cli_command, Cli, Commands, InspectFormat, OptimizeArgs};
pub use config::{apply_overrides, load_config, resolve_config};
