//! Run a generated script through a checker and diagnose the outcome.

use std::fmt;

use isl_smt::solver::{CheckOptions, SatisfiabilityChecker, SolverOutcome};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generator::{CheckKind, GeneratedScript};
use crate::minimizer::{extract_counterexample, minimize_counterexample, MinimizeOptions};
use crate::report::{DiagnosticReport, ReportContext};
use crate::unsat_core::analyze_unsat_core;

/// What answer means the checked property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckGoal {
    /// Unsat means the property holds; sat is a counterexample.
    Validity,
    /// Sat means the conditions can hold together; unsat is a conflict.
    Consistency,
}

impl CheckGoal {
    pub fn for_kind(kind: CheckKind) -> Self {
        match kind {
            CheckKind::Postcondition => CheckGoal::Validity,
            CheckKind::Precondition | CheckKind::Invariant | CheckKind::Refinement => {
                CheckGoal::Consistency
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Holds,
    Violated,
    Inconclusive,
}

impl Verdict {
    pub fn from_outcome(goal: CheckGoal, outcome: &SolverOutcome) -> Self {
        match (goal, outcome) {
            (CheckGoal::Validity, SolverOutcome::Unsat { .. })
            | (CheckGoal::Consistency, SolverOutcome::Sat { .. }) => Verdict::Holds,
            (CheckGoal::Validity, SolverOutcome::Sat { .. })
            | (CheckGoal::Consistency, SolverOutcome::Unsat { .. }) => Verdict::Violated,
            _ => Verdict::Inconclusive,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Holds => "holds",
            Verdict::Violated => "violated",
            Verdict::Inconclusive => "inconclusive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub check: CheckOptions,
    /// Minimize counterexamples (one extra query per candidate variable).
    pub minimize: bool,
    pub minimize_options: MinimizeOptions,
    /// Isolate a core when the solver reports none.
    pub isolate_cores: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check: CheckOptions::default(),
            minimize: false,
            minimize_options: MinimizeOptions::default(),
            isolate_cores: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub check: CheckKind,
    pub owner: String,
    pub goal: CheckGoal,
    pub verdict: Verdict,
    pub solver_calls: usize,
    pub report: DiagnosticReport,
}

/// Check `script`, then gather whatever evidence the outcome calls for.
pub fn run_check<C>(
    checker: &mut C,
    script: &GeneratedScript,
    goal: CheckGoal,
    options: &RunOptions,
) -> CheckReport
where
    C: SatisfiabilityChecker + ?Sized,
{
    let mut calls = 1;
    let mut outcome = checker.check_tagged(&script.assertions, &script.declarations, &options.check);

    if matches!(outcome, SolverOutcome::Sat { model: None }) && options.check.produce_models {
        let requery = checker.check_satisfiability(&script.formula(), &script.declarations, &options.check);
        calls += 1;
        if let SolverOutcome::Sat { model: Some(_) } = &requery {
            outcome = requery;
        }
    }

    let counterexample = match &outcome {
        SolverOutcome::Sat { model: Some(model) } if goal == CheckGoal::Validity => {
            let formula = script.formula();
            let cex = if options.minimize {
                minimize_counterexample(
                    checker,
                    &formula,
                    model,
                    &script.declarations,
                    Some(&script.source_map),
                    &options.minimize_options,
                )
            } else {
                extract_counterexample(&formula, model, Some(&script.source_map))
            };
            calls += cex.solver_calls;
            Some(cex)
        }
        _ => None,
    };

    let unsat_analysis = match &outcome {
        SolverOutcome::Unsat { core }
            if goal == CheckGoal::Consistency
                && (options.isolate_cores || core.as_ref().is_some_and(|c| !c.is_empty())) =>
        {
            let analysis = analyze_unsat_core(
                checker,
                &script.assertions,
                &script.declarations,
                core.as_deref(),
                Some(&script.source_map),
                &options.check,
            );
            calls += analysis.solver_calls;
            Some(analysis)
        }
        _ => None,
    };

    let ctx = ReportContext::for_script(script)
        .with_goal(goal)
        .with_timeout_ms(options.check.timeout_ms);
    let report = DiagnosticReport::from_parts(&outcome, counterexample, unsat_analysis, &ctx);
    let verdict = Verdict::from_outcome(goal, &outcome);

    info!(
        check = %script.check,
        owner = %script.owner,
        verdict = %verdict,
        outcome = outcome.status_name(),
        solver_calls = calls,
        skipped = script.errors.len(),
        "check finished"
    );

    CheckReport {
        check: script.check,
        owner: script.owner.clone(),
        goal,
        verdict,
        solver_calls: calls,
        report,
    }
}
