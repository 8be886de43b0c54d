use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use isl_smt::backends::process::{SmtLibProcess, SolverBinary};
use isl_smt::session::{SessionProfile, SolverSession};
use isl_smt::solver::{CheckOptions, SatisfiabilityChecker, SolverOutcome, TaggedAssertion};
use isl_smt::sorts::Declaration;
use isl_smt::terms::SmtTerm;
use isl_verify::check::{run_check, CheckGoal, CheckReport, RunOptions, Verdict};
use isl_verify::generator::{sanitize_symbol, CheckKind, GeneratedScript};
use isl_verify::minimizer::MinimizeOptions;
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing::{info, warn};

use super::{generation_options, load_scripts};
use crate::types::OutputFormat;

pub(crate) struct CheckArgs {
    pub(crate) file: PathBuf,
    pub(crate) solver: SolverBinary,
    pub(crate) solver_path: Option<String>,
    pub(crate) logic: String,
    pub(crate) timeout_ms: u64,
    pub(crate) minimize: bool,
    pub(crate) max_attempts: usize,
    pub(crate) format: OutputFormat,
    pub(crate) dump_smt: Option<PathBuf>,
}

/// The configured solver, or the reason it could not be started. An
/// unavailable backend answers every query with an error outcome so each
/// check still gets a report.
enum Backend {
    Process(Box<SolverSession<SmtLibProcess>>),
    Unavailable(String),
}

impl Backend {
    fn start(binary: SolverBinary, command: &str, logic: &str) -> Self {
        let spawned = SmtLibProcess::with_command(binary, command).and_then(|process| {
            if logic == "ALL" {
                Ok(process)
            } else {
                process.with_logic(logic)
            }
        });
        match spawned {
            Ok(process) => Backend::Process(Box::new(SolverSession::new(process))),
            Err(e) => {
                warn!("solver `{command}` unavailable: {e}");
                Backend::Unavailable(format!("solver `{command}` unavailable: {e}"))
            }
        }
    }

    fn profile(&self) -> Option<&SessionProfile> {
        match self {
            Backend::Process(session) => Some(session.profile()),
            Backend::Unavailable(_) => None,
        }
    }
}

impl SatisfiabilityChecker for Backend {
    fn check_satisfiability(
        &mut self,
        formula: &SmtTerm,
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> SolverOutcome {
        match self {
            Backend::Process(session) => {
                session.check_satisfiability(formula, declarations, options)
            }
            Backend::Unavailable(message) => SolverOutcome::Error {
                message: message.clone(),
            },
        }
    }

    fn check_tagged(
        &mut self,
        assertions: &[TaggedAssertion],
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> SolverOutcome {
        match self {
            Backend::Process(session) => session.check_tagged(assertions, declarations, options),
            Backend::Unavailable(message) => SolverOutcome::Error {
                message: message.clone(),
            },
        }
    }
}

#[derive(Serialize)]
struct CheckRunOutput<'a> {
    domain: &'a str,
    solver: &'a str,
    checks: &'a [CheckReport],
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a SessionProfile>,
}

fn kind_slug(kind: CheckKind) -> &'static str {
    match kind {
        CheckKind::Precondition => "precondition",
        CheckKind::Postcondition => "postcondition",
        CheckKind::Invariant => "invariant",
        CheckKind::Refinement => "refinement",
    }
}

fn dump_scripts(dir: &Path, scripts: &[GeneratedScript]) -> miette::Result<()> {
    fs::create_dir_all(dir).into_diagnostic()?;
    for script in scripts {
        let path = dir.join(format!(
            "{}_{}.smt2",
            kind_slug(script.check),
            sanitize_symbol(&script.owner)
        ));
        fs::write(&path, &script.script).into_diagnostic()?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn saturating_ms(ms: u128) -> u64 {
    u64::try_from(ms).unwrap_or(u64::MAX)
}

/// 0 when every check holds, 1 when any is violated, 2 when none is
/// violated but some are inconclusive.
fn exit_status(reports: &[CheckReport]) -> u8 {
    if reports.iter().any(|r| r.verdict == Verdict::Violated) {
        1
    } else if reports.iter().any(|r| r.verdict == Verdict::Inconclusive) {
        2
    } else {
        0
    }
}

fn render_check_text(report: &CheckReport) -> String {
    format!(
        "== {} of {}: {}\n{}",
        report.check,
        report.owner,
        report.verdict,
        report.report.render_text()
    )
}

pub(crate) fn run_check_command(args: CheckArgs) -> miette::Result<ExitCode> {
    let generation = generation_options(args.logic.clone(), args.timeout_ms);
    let (bundle, scripts) = load_scripts(&args.file, &generation)?;

    if let Some(dir) = &args.dump_smt {
        dump_scripts(dir, &scripts)?;
    }

    let command = args
        .solver_path
        .clone()
        .unwrap_or_else(|| args.solver.default_command().to_string());
    let mut backend = Backend::start(args.solver, &command, &args.logic);

    let options = RunOptions {
        check: CheckOptions {
            timeout_ms: args.timeout_ms,
            ..CheckOptions::default()
        },
        minimize: args.minimize,
        minimize_options: MinimizeOptions {
            max_attempts: args.max_attempts,
            check: CheckOptions {
                timeout_ms: args.timeout_ms,
                produce_models: false,
            },
        },
        ..RunOptions::default()
    };

    let reports: Vec<CheckReport> = scripts
        .iter()
        .map(|script| run_check(&mut backend, script, CheckGoal::for_kind(script.check), &options))
        .collect();

    if let Some(profile) = backend.profile() {
        info!(
            solve_calls = profile.solve_calls,
            solve_elapsed_ms = saturating_ms(profile.solve_elapsed_ms),
            backend_errors = profile.backend_errors,
            "solver session finished"
        );
    }

    match args.format {
        OutputFormat::Text => {
            println!("Domain {}: {} check(s) with {command}", bundle.domain, reports.len());
            for report in &reports {
                println!();
                print!("{}", render_check_text(report));
            }
        }
        OutputFormat::Json => {
            let output = CheckRunOutput {
                domain: &bundle.domain,
                solver: &command,
                checks: &reports,
                profile: backend.profile(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&output).into_diagnostic()?
            );
        }
    }

    Ok(ExitCode::from(exit_status(&reports)))
}
