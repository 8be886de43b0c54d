//! Counterexample minimization and blame attribution.
//!
//! Minimization is greedy and single-pass: each variable (in model order, up
//! to `max_attempts`) is dropped from the running model and the formula is
//! re-checked with every other variable pinned to its model value. A
//! variable is removed only when that query is still satisfiable.

use isl_smt::backends::smtlib_printer::to_smtlib;
use isl_smt::solver::{CheckOptions, Model, ModelValue, SatisfiabilityChecker};
use isl_smt::sorts::{Declaration, SmtSort};
use isl_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::is_whole;
use crate::evaluator::{evaluate, Truth};
use crate::source_map::{AssertionKind, SourceMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimizeOptions {
    /// Upper bound on candidate variables (one solver call each).
    pub max_attempts: usize,
    pub check: CheckOptions,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            check: CheckOptions {
                produce_models: false,
                ..CheckOptions::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinimalCounterexample {
    pub full_model: Model,
    pub minimal_model: Model,
    pub removed_variables: Vec<String>,
    pub explanation: String,
    pub violated_assertions: Vec<String>,
    pub solver_calls: usize,
}

/// Format a model and attribute the failure without calling a solver.
pub fn extract_counterexample(
    formula: &SmtTerm,
    model: &Model,
    source_map: Option<&SourceMap>,
) -> MinimalCounterexample {
    finish(formula, model.clone(), model.clone(), Vec::new(), 0, source_map)
}

/// Greedily drop variables that do not matter for `formula` being satisfied.
pub fn minimize_counterexample<C>(
    checker: &mut C,
    formula: &SmtTerm,
    model: &Model,
    declarations: &[Declaration],
    source_map: Option<&SourceMap>,
    options: &MinimizeOptions,
) -> MinimalCounterexample
where
    C: SatisfiabilityChecker + ?Sized,
{
    let decidable = evaluate(formula, model).is_true();
    let candidates: Vec<String> = model
        .names()
        .take(options.max_attempts)
        .map(str::to_string)
        .collect();

    let state = candidates.into_iter().fold(
        Working {
            model: model.clone(),
            removed: Vec::new(),
            calls: 0,
        },
        |state, candidate| {
            try_remove(
                checker,
                formula,
                declarations,
                decidable,
                &options.check,
                state,
                candidate,
            )
        },
    );

    finish(
        formula,
        model.clone(),
        state.model,
        state.removed,
        state.calls,
        source_map,
    )
}

struct Working {
    model: Model,
    removed: Vec<String>,
    calls: usize,
}

fn try_remove<C>(
    checker: &mut C,
    formula: &SmtTerm,
    declarations: &[Declaration],
    decidable: bool,
    options: &CheckOptions,
    mut state: Working,
    candidate: String,
) -> Working
where
    C: SatisfiabilityChecker + ?Sized,
{
    let mut reduced = state.model.clone();
    reduced.remove(&candidate);

    let pinned = pinned_formula(formula, &reduced, declarations);
    let remaining: Vec<Declaration> = declarations
        .iter()
        .filter(|d| d.name != candidate)
        .cloned()
        .collect();

    let outcome = checker.check_satisfiability(&pinned, &remaining, options);
    state.calls += 1;

    // The reduced model must still witness the failure whenever the
    // evaluator could decide it on the full model.
    let still_true = !decidable || evaluate(formula, &reduced).is_true();
    let removable = outcome.is_sat() && still_true;
    debug!(
        variable = %candidate,
        outcome = outcome.status_name(),
        still_true,
        removable,
        "minimization attempt"
    );

    if removable {
        state.model = reduced;
        state.removed.push(candidate);
    }
    state
}

/// `formula` conjoined with a pin for every declared variable in `model`.
pub fn pinned_formula(formula: &SmtTerm, model: &Model, declarations: &[Declaration]) -> SmtTerm {
    let pins = model.values.iter().filter_map(|(name, value)| {
        let decl = declarations.iter().find(|d| &d.name == name)?;
        pin(name, value, &decl.sort)
    });
    let mut conjuncts = vec![formula.clone()];
    conjuncts.extend(pins);
    SmtTerm::and(conjuncts)
}

/// Constraint fixing `name` to `value`, if the value is expressible.
pub fn pin(name: &str, value: &ModelValue, sort: &SmtSort) -> Option<SmtTerm> {
    let var = SmtTerm::var(name);
    match value {
        ModelValue::Bool(true) => Some(var),
        ModelValue::Bool(false) => Some(var.not()),
        ModelValue::Int(n) if *sort == SmtSort::Real => Some(var.eq(SmtTerm::real(*n as f64))),
        ModelValue::Int(n) => Some(var.eq(SmtTerm::int(*n))),
        ModelValue::Real(r) if !r.is_finite() => None,
        ModelValue::Real(r) if *sort != SmtSort::Real && is_whole(*r) => {
            Some(var.eq(SmtTerm::int(*r as i64)))
        }
        ModelValue::Real(r) => Some(var.eq(SmtTerm::real(*r))),
        ModelValue::Other(_) => None,
    }
}

fn finish(
    formula: &SmtTerm,
    full_model: Model,
    minimal_model: Model,
    removed_variables: Vec<String>,
    solver_calls: usize,
    source_map: Option<&SourceMap>,
) -> MinimalCounterexample {
    let violated_assertions = violated_assertions(formula, &minimal_model, &full_model, source_map);
    let explanation = explain(&full_model, &minimal_model, &removed_variables, &violated_assertions);
    MinimalCounterexample {
        full_model,
        minimal_model,
        removed_variables,
        explanation,
        violated_assertions,
        solver_calls,
    }
}

/// Describe which parts of `formula` the counterexample violates.
///
/// Each top-level conjunct is inspected: a negated goal that holds blames
/// the goal (or, for a negated conjunction, each of its false members); a
/// conjunct that is false is blamed directly. Conjuncts the evaluator cannot
/// decide on `model` are retried on `fallback`.
pub fn violated_assertions(
    formula: &SmtTerm,
    model: &Model,
    fallback: &Model,
    source_map: Option<&SourceMap>,
) -> Vec<String> {
    let truth = |term: &SmtTerm| match evaluate(term, model) {
        Truth::Unknown => evaluate(term, fallback),
        known => known,
    };

    let mut out = Vec::new();
    for conjunct in formula.conjuncts() {
        match conjunct {
            SmtTerm::Not(goal) if truth(conjunct).is_true() => match goal.as_ref() {
                SmtTerm::And(parts) => out.extend(
                    parts
                        .iter()
                        .filter(|p| truth(*p).is_false())
                        .map(|p| describe(p, source_map, true)),
                ),
                other => out.push(describe(other, source_map, true)),
            },
            other if truth(other).is_false() => out.push(describe(other, source_map, false)),
            _ => {}
        }
    }
    out
}

fn describe(term: &SmtTerm, source_map: Option<&SourceMap>, goal: bool) -> String {
    let text = to_smtlib(term);
    let Some(map) = source_map else {
        return text;
    };
    let entry = if goal {
        map.iter()
            .find(|e| e.kind == AssertionKind::Postcondition && e.smt_text == text)
            .or_else(|| map.find_by_smt_text(&text))
    } else {
        map.find_by_smt_text(&text)
    };
    entry.map(|e| e.describe()).unwrap_or(text)
}

fn explain(
    full: &Model,
    minimal: &Model,
    removed: &[String],
    violated: &[String],
) -> String {
    let assignments: Vec<String> = minimal
        .values
        .iter()
        .map(|(name, value)| format!("{name} = {value}"))
        .collect();
    let mut out = if assignments.is_empty() {
        "Counterexample found with no relevant assignments".to_string()
    } else {
        format!("Counterexample: {}", assignments.join(", "))
    };
    if !removed.is_empty() {
        out.push_str(&format!(
            "\n{} of {} variables irrelevant and removed: {}",
            removed.len(),
            full.len(),
            removed.join(", ")
        ));
    }
    if violated.is_empty() {
        out.push_str("\nCould not attribute the failure to a specific assertion");
    } else {
        out.push_str("\nViolated:");
        for v in violated {
            out.push_str("\n  - ");
            out.push_str(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_smt::solver::SolverOutcome;

    /// Answers sat unless a formula mentions an undeclared variable, the way
    /// a real backend rejects unknown constants.
    struct DeclaredOnly {
        calls: Vec<(String, Vec<String>)>,
    }

    impl SatisfiabilityChecker for DeclaredOnly {
        fn check_satisfiability(
            &mut self,
            formula: &SmtTerm,
            declarations: &[Declaration],
            _options: &CheckOptions,
        ) -> SolverOutcome {
            self.calls.push((
                to_smtlib(formula),
                declarations.iter().map(|d| d.name.clone()).collect(),
            ));
            let undeclared = formula
                .free_variables()
                .into_iter()
                .find(|v| !declarations.iter().any(|d| &d.name == v));
            match undeclared {
                Some(v) => SolverOutcome::Error {
                    message: format!("unknown constant {v}"),
                },
                None => SolverOutcome::Sat { model: None },
            }
        }
    }

    #[test]
    fn removes_irrelevant_variable_and_keeps_relevant_one() {
        let formula = SmtTerm::var("x").gt(SmtTerm::int(0));
        let model: Model = [
            ("x", ModelValue::Int(5)),
            ("y", ModelValue::Other("unused".into())),
        ]
        .into_iter()
        .collect();
        let decls = vec![Declaration::int("x"), Declaration::int("y")];
        let mut checker = DeclaredOnly { calls: Vec::new() };

        let cex = minimize_counterexample(
            &mut checker,
            &formula,
            &model,
            &decls,
            None,
            &MinimizeOptions::default(),
        );

        assert_eq!(cex.removed_variables, vec!["y".to_string()]);
        assert_eq!(cex.minimal_model.names().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(cex.full_model, model);
        assert_eq!(cex.solver_calls, 2);
        // Dropping y pins x to its value.
        assert_eq!(checker.calls[1].0, "(and (> x 0) (= x 5))");
        assert_eq!(checker.calls[1].1, vec!["x".to_string()]);
    }

    #[test]
    fn inconclusive_checks_keep_the_variable() {
        struct Timeouts;
        impl SatisfiabilityChecker for Timeouts {
            fn check_satisfiability(
                &mut self,
                _: &SmtTerm,
                _: &[Declaration],
                _: &CheckOptions,
            ) -> SolverOutcome {
                SolverOutcome::Timeout { elapsed_ms: 5_000 }
            }
        }
        let model: Model = [("a", ModelValue::Int(1)), ("b", ModelValue::Int(2))]
            .into_iter()
            .collect();
        let cex = minimize_counterexample(
            &mut Timeouts,
            &SmtTerm::var("a").lt(SmtTerm::var("b")),
            &model,
            &[Declaration::int("a"), Declaration::int("b")],
            None,
            &MinimizeOptions::default(),
        );
        assert!(cex.removed_variables.is_empty());
        assert_eq!(cex.minimal_model, model);
    }

    #[test]
    fn attempts_are_capped() {
        let model: Model = (0..30)
            .map(|i| (format!("v{i}"), ModelValue::Int(i)))
            .collect();
        let decls: Vec<Declaration> = (0..30).map(|i| Declaration::int(format!("v{i}"))).collect();
        let mut checker = DeclaredOnly { calls: Vec::new() };
        let cex = minimize_counterexample(
            &mut checker,
            &SmtTerm::bool(true),
            &model,
            &decls,
            None,
            &MinimizeOptions {
                max_attempts: 5,
                ..MinimizeOptions::default()
            },
        );
        assert_eq!(cex.solver_calls, 5);
        assert_eq!(cex.removed_variables.len(), 5);
        assert_eq!(cex.minimal_model.len(), 25);
    }

    #[test]
    fn pins_follow_value_and_sort() {
        assert_eq!(
            pin("b", &ModelValue::Bool(false), &SmtSort::Bool),
            Some(SmtTerm::var("b").not())
        );
        assert_eq!(
            pin("n", &ModelValue::Int(3), &SmtSort::Real),
            Some(SmtTerm::var("n").eq(SmtTerm::real(3.0)))
        );
        assert_eq!(
            pin("n", &ModelValue::Real(4.0), &SmtSort::Int),
            Some(SmtTerm::var("n").eq(SmtTerm::int(4)))
        );
        assert_eq!(
            pin("r", &ModelValue::Real(0.5), &SmtSort::Int),
            Some(SmtTerm::var("r").eq(SmtTerm::real(0.5)))
        );
        assert_eq!(
            pin("u", &ModelValue::Other("x".into()), &SmtSort::Int),
            None
        );
    }

    #[test]
    fn blames_false_members_of_negated_goal() {
        let x = || SmtTerm::var("x");
        let formula = SmtTerm::and(vec![
            x().gt(SmtTerm::int(0)),
            SmtTerm::and(vec![x().gt(SmtTerm::int(0)), x().lt(SmtTerm::int(100))]).not(),
        ]);
        let model: Model = [("x", ModelValue::Int(150))].into_iter().collect();
        let cex = extract_counterexample(&formula, &model, None);
        assert_eq!(cex.violated_assertions, vec!["(< x 100)".to_string()]);
        assert_eq!(cex.solver_calls, 0);
        assert!(cex.explanation.contains("x = 150"));
        assert!(cex.explanation.contains("(< x 100)"));
    }
}
