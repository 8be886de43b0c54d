//! Unsat-core analysis: find which tagged assertions make a query unsat.
//!
//! A core reported by the solver is trusted as-is. Without one, the analyzer
//! isolates a core itself: first by checking each assertion alone, then by
//! accumulating assertions in order until the running conjunction turns
//! unsat. Every query is issued sequentially and the number of queries is
//! bounded by twice the assertion count.

use std::fmt;
use std::ops::ControlFlow;

use isl_smt::backends::smtlib_printer::to_smtlib;
use isl_smt::solver::{CheckOptions, SatisfiabilityChecker, SolverOutcome, TaggedAssertion};
use isl_smt::sorts::Declaration;
use isl_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::source_map::{SourceMap, SourceMappedAssertion};

/// How a core was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreOrigin {
    /// Named core returned by the solver.
    SolverReported,
    /// A single assertion that is unsat on its own.
    SelfContradictory,
    /// Shortest unsat prefix of the assertion list. Sufficient, not minimal.
    IncrementalPrefix,
    /// Re-checking all assertions together came back sat, contradicting the
    /// verdict being analyzed. No core is reported.
    InconsistentVerdicts,
    /// An isolation query was neither sat nor unsat. No core is reported.
    Inconclusive,
}

impl fmt::Display for CoreOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoreOrigin::SolverReported => "solver-reported",
            CoreOrigin::SelfContradictory => "self-contradictory assertion",
            CoreOrigin::IncrementalPrefix => "incremental accumulation",
            CoreOrigin::InconsistentVerdicts => "inconsistent solver verdicts",
            CoreOrigin::Inconclusive => "inconclusive isolation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnsatAnalysis {
    pub core_tags: Vec<String>,
    /// Source-map entries for the core tags that could be resolved.
    pub core_assertions: Vec<SourceMappedAssertion>,
    /// Core tags with no source-map entry.
    pub unresolved_tags: Vec<String>,
    pub explanation: String,
    /// True iff the core is a single assertion.
    pub is_minimal: bool,
    pub origin: CoreOrigin,
    pub solver_calls: usize,
}

/// Explain why `assertions` are jointly unsat.
///
/// `reported_core` is the solver's named core, if any; an empty core is
/// treated as absent.
pub fn analyze_unsat_core<C>(
    checker: &mut C,
    assertions: &[TaggedAssertion],
    declarations: &[Declaration],
    reported_core: Option<&[String]>,
    source_map: Option<&SourceMap>,
    options: &CheckOptions,
) -> UnsatAnalysis
where
    C: SatisfiabilityChecker + ?Sized,
{
    if let Some(core) = reported_core.filter(|core| !core.is_empty()) {
        return analysis_from_reported_core(core, assertions, source_map);
    }

    let options = CheckOptions {
        produce_models: false,
        ..options.clone()
    };
    let mut calls = 0;
    let isolation = isolate(checker, assertions, declarations, &options, &mut calls);
    match isolation {
        Isolation::Found { tags, origin } => build(tags, origin, calls, assertions, source_map, None),
        Isolation::Inconsistent => {
            warn!(
                assertions = assertions.len(),
                "assertions are jointly sat on re-check; solver verdicts disagree"
            );
            build(
                Vec::new(),
                CoreOrigin::InconsistentVerdicts,
                calls,
                assertions,
                source_map,
                None,
            )
        }
        Isolation::Inconclusive { prefix, outcome } => build(
            Vec::new(),
            CoreOrigin::Inconclusive,
            calls,
            assertions,
            source_map,
            Some((prefix, outcome)),
        ),
    }
}

/// Resolve a solver-reported core without issuing any query.
pub fn analysis_from_reported_core(
    core: &[String],
    assertions: &[TaggedAssertion],
    source_map: Option<&SourceMap>,
) -> UnsatAnalysis {
    build(core.to_vec(), CoreOrigin::SolverReported, 0, assertions, source_map, None)
}

enum Isolation {
    Found { tags: Vec<String>, origin: CoreOrigin },
    Inconsistent,
    Inconclusive { prefix: usize, outcome: SolverOutcome },
}

fn isolate<C>(
    checker: &mut C,
    assertions: &[TaggedAssertion],
    declarations: &[Declaration],
    options: &CheckOptions,
    calls: &mut usize,
) -> Isolation
where
    C: SatisfiabilityChecker + ?Sized,
{
    let mut singles = Vec::with_capacity(assertions.len());
    for assertion in assertions {
        let outcome = checker.check_satisfiability(&assertion.term, declarations, options);
        *calls += 1;
        debug!(tag = %assertion.tag, outcome = outcome.status_name(), "single-assertion query");
        if outcome.is_unsat() {
            return Isolation::Found {
                tags: vec![assertion.tag.clone()],
                origin: CoreOrigin::SelfContradictory,
            };
        }
        singles.push(outcome);
    }

    let accumulated = (1..=assertions.len()).try_fold((), |(), len| {
        // The one-element prefix was already answered above.
        let outcome = match (len, singles.first()) {
            (1, Some(first)) => first.clone(),
            _ => {
                let prefix = SmtTerm::and(assertions[..len].iter().map(|a| a.term.clone()).collect());
                *calls += 1;
                checker.check_satisfiability(&prefix, declarations, options)
            }
        };
        debug!(prefix = len, outcome = outcome.status_name(), "accumulation query");
        prefix_step(assertions, len, outcome)
    });

    match accumulated {
        ControlFlow::Break(isolation) => isolation,
        ControlFlow::Continue(()) => Isolation::Inconsistent,
    }
}

fn prefix_step(
    assertions: &[TaggedAssertion],
    len: usize,
    outcome: SolverOutcome,
) -> ControlFlow<Isolation> {
    match outcome {
        SolverOutcome::Sat { .. } => ControlFlow::Continue(()),
        SolverOutcome::Unsat { .. } => ControlFlow::Break(Isolation::Found {
            tags: assertions[..len].iter().map(|a| a.tag.clone()).collect(),
            origin: CoreOrigin::IncrementalPrefix,
        }),
        inconclusive => ControlFlow::Break(Isolation::Inconclusive {
            prefix: len,
            outcome: inconclusive,
        }),
    }
}

fn build(
    core_tags: Vec<String>,
    origin: CoreOrigin,
    solver_calls: usize,
    assertions: &[TaggedAssertion],
    source_map: Option<&SourceMap>,
    inconclusive: Option<(usize, SolverOutcome)>,
) -> UnsatAnalysis {
    let (core_assertions, unresolved_tags) = match source_map {
        Some(map) => {
            let (resolved, unresolved) = map.resolve(&core_tags);
            (resolved.into_iter().cloned().collect(), unresolved)
        }
        None => (Vec::new(), core_tags.clone()),
    };

    let describe = |tag: &String| -> String {
        if let Some(entry) = source_map.and_then(|m| m.get(tag)) {
            return entry.describe();
        }
        match assertions.iter().find(|a| &a.tag == tag) {
            Some(a) => format!("{tag}: {}", to_smtlib(&a.term)),
            None => tag.clone(),
        }
    };

    let explanation = match (origin, core_tags.as_slice()) {
        (CoreOrigin::InconsistentVerdicts, _) => format!(
            "All {} assertions are satisfiable together when re-checked, \
             contradicting the unsat verdict. The solver answers are inconsistent \
             (nondeterminism or a timeout/context mismatch); no core is reported.",
            assertions.len()
        ),
        (CoreOrigin::Inconclusive, _) => match inconclusive {
            Some((prefix, outcome)) => format!(
                "Could not isolate the conflicting constraints: checking the first {prefix} \
                 assertion(s) returned {outcome}."
            ),
            None => "Could not isolate the conflicting constraints.".to_string(),
        },
        (CoreOrigin::SelfContradictory, [tag]) => {
            format!("Constraint is unsatisfiable on its own:\n  - {}", describe(tag))
        }
        (_, [tag]) => format!("A single constraint causes the conflict:\n  - {}", describe(tag)),
        (_, tags) => {
            let mut out = format!("{} constraints conflict with each other:", tags.len());
            for tag in tags {
                out.push_str("\n  - ");
                out.push_str(&describe(tag));
            }
            if origin == CoreOrigin::IncrementalPrefix {
                out.push_str("\nFound by incremental accumulation; the set is sufficient but may not be minimal.");
            }
            out
        }
    };

    UnsatAnalysis {
        is_minimal: core_tags.len() == 1,
        core_tags,
        core_assertions,
        unresolved_tags,
        explanation,
        origin,
        solver_calls,
    }
}
