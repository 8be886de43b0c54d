#![allow(dead_code)]

use std::collections::BTreeSet;

use isl_smt::backends::smtlib_printer::to_smtlib;
use isl_smt::solver::{CheckOptions, Model, ModelValue, SatisfiabilityChecker, SolverOutcome};
use isl_smt::sorts::{Declaration, SmtSort};
use isl_smt::terms::SmtTerm;
use isl_verify::evaluator::{evaluate, Truth};

/// Decides small formulas by enumerating candidate values around every
/// literal in the query. Good enough for comparisons against constants.
#[derive(Debug, Default)]
pub struct FiniteDomainChecker {
    pub queries: Vec<String>,
}

impl FiniteDomainChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.queries.len()
    }
}

const MAX_ASSIGNMENTS: usize = 200_000;

impl SatisfiabilityChecker for FiniteDomainChecker {
    fn check_satisfiability(
        &mut self,
        formula: &SmtTerm,
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> SolverOutcome {
        self.queries.push(to_smtlib(formula));

        let free = formula.free_variables();
        if let Some(missing) = free
            .iter()
            .find(|v| !declarations.iter().any(|d| &d.name == *v))
        {
            return SolverOutcome::Error {
                message: format!("unknown constant {missing}"),
            };
        }

        let mut literals = BTreeSet::new();
        collect_literals(formula, &mut literals);
        let ints: Vec<i64> = literals
            .iter()
            .flat_map(|&n| [n.saturating_sub(1), n, n.saturating_add(1)])
            .chain([0])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let domains: Vec<Vec<ModelValue>> = declarations
            .iter()
            .map(|d| match (&d.sort, free.contains(&d.name)) {
                (_, false) => vec![default_value(&d.sort)],
                (SmtSort::Bool, true) => vec![ModelValue::Bool(false), ModelValue::Bool(true)],
                (SmtSort::Int, true) => ints.iter().map(|&n| ModelValue::Int(n)).collect(),
                (SmtSort::Real, true) => ints
                    .iter()
                    .flat_map(|&n| [ModelValue::Real(n as f64), ModelValue::Real(n as f64 + 0.5)])
                    .collect(),
                (SmtSort::Uninterpreted(name), true) => {
                    vec![ModelValue::Other(format!("(as @{name}_0 {name})"))]
                }
            })
            .collect();

        let mut saw_unknown = false;
        let mut odometer = vec![0usize; domains.len()];
        for _ in 0..MAX_ASSIGNMENTS {
            let model: Model = declarations
                .iter()
                .zip(&odometer)
                .zip(&domains)
                .map(|((d, &i), dom)| (d.name.clone(), dom[i].clone()))
                .collect();
            match evaluate(formula, &model) {
                Truth::True => {
                    return SolverOutcome::Sat {
                        model: options.produce_models.then_some(model),
                    }
                }
                Truth::Unknown => saw_unknown = true,
                Truth::False => {}
            }
            if !advance(&mut odometer, &domains) {
                return if saw_unknown {
                    SolverOutcome::Unknown {
                        reason: "incomplete".into(),
                    }
                } else {
                    SolverOutcome::Unsat { core: None }
                };
            }
        }
        SolverOutcome::Unknown {
            reason: "resourceout".into(),
        }
    }
}

fn default_value(sort: &SmtSort) -> ModelValue {
    match sort {
        SmtSort::Bool => ModelValue::Bool(false),
        SmtSort::Int => ModelValue::Int(0),
        SmtSort::Real => ModelValue::Real(0.0),
        SmtSort::Uninterpreted(name) => ModelValue::Other(format!("(as @{name}_0 {name})")),
    }
}

fn advance(odometer: &mut [usize], domains: &[Vec<ModelValue>]) -> bool {
    for (digit, domain) in odometer.iter_mut().zip(domains) {
        *digit += 1;
        if *digit < domain.len() {
            return true;
        }
        *digit = 0;
    }
    false
}

fn collect_literals(term: &SmtTerm, out: &mut BTreeSet<i64>) {
    match term {
        SmtTerm::IntLit(n) => {
            out.insert(*n);
        }
        SmtTerm::RealLit(r) if r.is_finite() && r.abs() < 1e15 => {
            out.insert(r.floor() as i64);
        }
        SmtTerm::Neg(inner) | SmtTerm::Not(inner) => collect_literals(inner, out),
        SmtTerm::Add(l, r)
        | SmtTerm::Sub(l, r)
        | SmtTerm::Mul(l, r)
        | SmtTerm::Eq(l, r)
        | SmtTerm::Lt(l, r)
        | SmtTerm::Le(l, r)
        | SmtTerm::Gt(l, r)
        | SmtTerm::Ge(l, r)
        | SmtTerm::Implies(l, r) => {
            collect_literals(l, out);
            collect_literals(r, out);
        }
        SmtTerm::And(terms) | SmtTerm::Or(terms) => {
            for t in terms {
                collect_literals(t, out);
            }
        }
        SmtTerm::Ite(c, t, e) => {
            collect_literals(c, out);
            collect_literals(t, out);
            collect_literals(e, out);
        }
        _ => {}
    }
}

/// Answers from a fixed script, cycling when exhausted.
pub struct ScriptedChecker {
    pub outcomes: Vec<SolverOutcome>,
    pub next: usize,
}

impl ScriptedChecker {
    pub fn new(outcomes: Vec<SolverOutcome>) -> Self {
        Self { outcomes, next: 0 }
    }
}

impl SatisfiabilityChecker for ScriptedChecker {
    fn check_satisfiability(
        &mut self,
        _formula: &SmtTerm,
        _declarations: &[Declaration],
        _options: &CheckOptions,
    ) -> SolverOutcome {
        let outcome = match self.outcomes.get(self.next % self.outcomes.len().max(1)) {
            Some(outcome) => outcome.clone(),
            None => SolverOutcome::Unknown {
                reason: "no scripted outcome".into(),
            },
        };
        self.next += 1;
        outcome
    }
}
