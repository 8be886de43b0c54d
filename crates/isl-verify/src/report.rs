//! One diagnostic report per solve attempt.
//!
//! Building a report never fails. Evidence that is missing (no model, no
//! core, no source map) leaves the matching field empty; every report still
//! restates the solver result and carries at least one suggestion.

use std::fmt::Write as _;

use isl_smt::solver::{SolverOutcome, TaggedAssertion};
use isl_smt::terms::SmtTerm;
use serde::Serialize;

use crate::check::CheckGoal;
use crate::classify::{classify_unknown, ComplexityMetrics, UnknownReason};
use crate::generator::{EncodingFailure, GeneratedScript};
use crate::minimizer::{extract_counterexample, MinimalCounterexample};
use crate::source_map::SourceMap;
use crate::unsat_core::{analysis_from_reported_core, CoreOrigin, UnsatAnalysis};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub result: SolverOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterexample: Option<MinimalCounterexample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsat_analysis: Option<UnsatAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_reason: Option<UnknownReason>,
    pub suggestions: Vec<String>,
    pub script: String,
}

/// What a report is built against. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct ReportContext<'a> {
    pub script: &'a str,
    /// Formula the counterexample is checked against.
    pub formula: Option<SmtTerm>,
    pub assertions: &'a [TaggedAssertion],
    pub source_map: Option<&'a SourceMap>,
    pub goal: Option<CheckGoal>,
    pub timeout_ms: Option<u64>,
    pub skipped: &'a [EncodingFailure],
}

impl<'a> ReportContext<'a> {
    pub fn for_script(script: &'a GeneratedScript) -> Self {
        Self {
            script: &script.script,
            formula: Some(script.formula()),
            assertions: &script.assertions,
            source_map: Some(&script.source_map),
            goal: None,
            timeout_ms: None,
            skipped: &script.errors,
        }
    }

    pub fn with_goal(mut self, goal: CheckGoal) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    fn metrics(&self) -> ComplexityMetrics {
        ComplexityMetrics {
            assertions: self.assertions.len(),
            variables: self
                .formula
                .as_ref()
                .map(|f| f.free_variables().len())
                .unwrap_or(0),
        }
    }
}

/// Build a report from the solver outcome alone, without further solver calls.
///
/// A model is formatted and attributed but not minimized; a reported core is
/// resolved but not isolated when absent.
pub fn build_diagnostic_report(outcome: &SolverOutcome, ctx: &ReportContext<'_>) -> DiagnosticReport {
    let counterexample = match outcome {
        SolverOutcome::Sat { model: Some(model) } => {
            let formula = ctx.formula.clone().unwrap_or_else(|| SmtTerm::and(Vec::new()));
            Some(extract_counterexample(&formula, model, ctx.source_map))
        }
        _ => None,
    };
    let unsat_analysis = match outcome {
        SolverOutcome::Unsat { core: Some(core) } if !core.is_empty() => Some(
            analysis_from_reported_core(core, ctx.assertions, ctx.source_map),
        ),
        _ => None,
    };
    DiagnosticReport::from_parts(outcome, counterexample, unsat_analysis, ctx)
}

impl DiagnosticReport {
    /// Assemble a report from evidence gathered elsewhere. Evidence that
    /// does not match the outcome is dropped.
    pub fn from_parts(
        outcome: &SolverOutcome,
        counterexample: Option<MinimalCounterexample>,
        unsat_analysis: Option<UnsatAnalysis>,
        ctx: &ReportContext<'_>,
    ) -> Self {
        let counterexample = counterexample.filter(|_| outcome.is_sat());
        let unsat_analysis = unsat_analysis.filter(|_| outcome.is_unsat());
        let unknown_reason =
            classify_unknown(outcome).map(|reason| reason.with_metrics(ctx.metrics()));

        let mut report = DiagnosticReport {
            result: outcome.clone(),
            counterexample,
            unsat_analysis,
            unknown_reason,
            suggestions: Vec::new(),
            script: ctx.script.to_string(),
        };
        report.suggestions = suggestions(&report, ctx);
        report
    }

    /// Human-readable multi-line rendering. The script is not included.
    pub fn render_text(&self) -> String {
        let mut out = format!("Result: {}\n", self.result);
        if let Some(cex) = &self.counterexample {
            out.push_str(&cex.explanation);
            out.push('\n');
        }
        if let Some(analysis) = &self.unsat_analysis {
            let _ = writeln!(out, "Unsat core ({}):", analysis.origin);
            out.push_str(&analysis.explanation);
            out.push('\n');
        }
        if let Some(reason) = &self.unknown_reason {
            let _ = writeln!(out, "Reason: {reason}");
        }
        out.push_str("Suggestions:\n");
        for suggestion in &self.suggestions {
            let _ = writeln!(out, "  - {suggestion}");
        }
        out
    }
}

fn suggestions(report: &DiagnosticReport, ctx: &ReportContext<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if !ctx.skipped.is_empty() {
        out.push(format!(
            "{} condition(s) could not be encoded and were left out of the query; fix them so the result covers every condition",
            ctx.skipped.len()
        ));
    }

    match (&report.result, ctx.goal) {
        (SolverOutcome::Sat { .. }, Some(CheckGoal::Consistency)) => {
            out.push("The conditions are consistent; no action needed".to_string());
        }
        (SolverOutcome::Unsat { .. }, Some(CheckGoal::Validity)) => {
            out.push("The property holds; no action needed".to_string());
        }
        (SolverOutcome::Sat { model: None }, _) => {
            out.push("Re-run with model production enabled to obtain a counterexample".to_string());
        }
        (SolverOutcome::Sat { .. }, _) => counterexample_suggestions(report, &mut out),
        (SolverOutcome::Unsat { .. }, _) => core_suggestions(report, &mut out),
        _ => unknown_suggestions(report, ctx, &mut out),
    }
    out
}

fn counterexample_suggestions(report: &DiagnosticReport, out: &mut Vec<String>) {
    let Some(cex) = &report.counterexample else {
        out.push("Inspect the model returned by the solver".to_string());
        return;
    };
    if cex.violated_assertions.is_empty() {
        out.push(
            "The failure could not be attributed to a single condition; inspect the counterexample values"
                .to_string(),
        );
    } else {
        out.push(format!(
            "Strengthen the preconditions or fix the behavior so that {} holds for the counterexample",
            cex.violated_assertions.join("; ")
        ));
    }
    if cex.removed_variables.is_empty() && cex.solver_calls == 0 && cex.full_model.len() > 1 {
        out.push("Minimize the counterexample to drop irrelevant variables".to_string());
    }
}

fn core_suggestions(report: &DiagnosticReport, out: &mut Vec<String>) {
    let Some(analysis) = &report.unsat_analysis else {
        out.push(
            "Enable unsat-core production or core isolation to locate the conflicting conditions"
                .to_string(),
        );
        return;
    };
    match analysis.origin {
        CoreOrigin::InconsistentVerdicts => out.push(
            "Solver verdicts disagreed; re-run with a longer timeout or a different solver".to_string(),
        ),
        CoreOrigin::Inconclusive => out.push(
            "Core isolation was inconclusive; increase the timeout to isolate the conflict".to_string(),
        ),
        _ if analysis.is_minimal => out.push(format!(
            "Fix {}: it cannot be satisfied by any value",
            analysis.core_tags.join(", ")
        )),
        _ => out.push(format!(
            "Relax or remove one of the conflicting conditions: {}",
            analysis.core_tags.join(", ")
        )),
    }
}

fn unknown_suggestions(report: &DiagnosticReport, ctx: &ReportContext<'_>, out: &mut Vec<String>) {
    let timeout = ctx
        .timeout_ms
        .map(|ms| format!(" (currently {ms}ms)"))
        .unwrap_or_default();
    match &report.unknown_reason {
        Some(UnknownReason::Timeout { .. }) => {
            out.push(format!("Increase the solver timeout{timeout}"));
            out.push("Split the condition into smaller checks".to_string());
        }
        Some(UnknownReason::ResourceLimit { .. }) => {
            out.push("Raise the solver's memory or resource limit".to_string());
            out.push("Simplify constraints to reduce solver effort".to_string());
        }
        Some(UnknownReason::IncompleteTheory { .. }) => {
            out.push("Avoid nonlinear arithmetic and quantifiers in the condition".to_string());
            out.push("Try a different solver (cvc5 or z3)".to_string());
        }
        Some(UnknownReason::Cancelled) => {
            out.push("The check was cancelled; re-run it to completion".to_string());
        }
        Some(UnknownReason::SolverError { .. }) => {
            out.push("Install a production solver (cvc5 or z3) and make sure it is on PATH".to_string());
            out.push("Inspect the generated script for constructs the solver rejects".to_string());
        }
        Some(UnknownReason::TooComplex { .. }) => {
            out.push("Simplify constraints or split the condition into smaller checks".to_string());
        }
        Some(UnknownReason::Unclassified { .. }) | None => {
            out.push(format!("Increase the solver timeout{timeout} or try a different solver"));
        }
    }
}
