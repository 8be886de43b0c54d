#![doc = include_str!("../README.md")]

mod bundle;
mod cli;
mod commands;
mod types;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> miette::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            file,
            logic,
            timeout_ms,
        } => {
            commands::generate::run_generate_command(file, logic, timeout_ms)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            file,
            solver,
            solver_path,
            logic,
            timeout_ms,
            minimize,
            max_attempts,
            format,
            dump_smt,
        } => commands::check::run_check_command(commands::check::CheckArgs {
            file,
            solver,
            solver_path,
            logic,
            timeout_ms,
            minimize,
            max_attempts,
            format,
            dump_smt,
        }),
    }
}
