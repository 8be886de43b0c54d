//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use isl_smt::backends::process::SolverBinary;

use crate::types::OutputFormat;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Generate SMT-LIB verification conditions from an ISL specification bundle and \
    diagnose the solver's answers.\n\n\
    Typical use:\n  \
    1. isl-check generate bank.json\n  \
    2. isl-check check bank.json --minimize\n\n\
    Every assertion is named after the clause it came from (pre_*, post_*, neg_post_*, \
    inv_*, ref_*), so counterexamples and unsat cores point back at the bundle.";

#[derive(Parser)]
#[command(name = "isl-check")]
#[command(about = "Generate and check SMT verification conditions for ISL specifications")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the SMT-LIB script generated for every check in a bundle
    Generate {
        /// Path to the JSON specification bundle
        file: PathBuf,

        /// SMT-LIB logic for `set-logic`
        #[arg(long, default_value = "ALL")]
        logic: String,

        /// Solver timeout written into the scripts (0 omits it)
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },

    /// Run every check in a bundle through a solver and print diagnostics
    Check {
        /// Path to the JSON specification bundle
        file: PathBuf,

        /// Solver dialect: cvc5 | z3
        #[arg(long, default_value = "cvc5")]
        solver: SolverBinary,

        /// Solver executable (defaults to the dialect's name on PATH)
        #[arg(long)]
        solver_path: Option<String>,

        /// SMT-LIB logic for `set-logic`
        #[arg(long, default_value = "ALL")]
        logic: String,

        /// Per-query solver timeout in milliseconds (0 disables)
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,

        /// Minimize counterexamples by dropping irrelevant variables
        #[arg(long, default_value_t = false)]
        minimize: bool,

        /// Maximum variables tried during minimization
        #[arg(long, default_value_t = 20)]
        max_attempts: usize,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write each generated script to DIR/<check>_<owner>.smt2
        #[arg(long, value_name = "DIR")]
        dump_smt: Option<PathBuf>,
    },
}
