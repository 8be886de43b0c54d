//! Three-valued evaluation of ground formulas under a model.
//!
//! Shapes the evaluator cannot interpret (quantifiers, uninterpreted values,
//! missing variables, overflowing arithmetic) evaluate to
//! [`Truth::Unknown`]; the evaluator never guesses.

use std::cmp::Ordering;

use isl_smt::solver::{Model, ModelValue};
use isl_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }

    pub fn is_true(self) -> bool {
        self == Truth::True
    }

    pub fn is_false(self) -> bool {
        self == Truth::False
    }

    pub fn is_known(self) -> bool {
        self != Truth::Unknown
    }

    pub fn negate(self) -> Self {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Real(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(n) => n as f64,
            Numeric::Real(r) => r,
        }
    }

    fn compare(self, other: Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

/// Truth value of `term` under `model`.
pub fn evaluate(term: &SmtTerm, model: &Model) -> Truth {
    match term {
        SmtTerm::BoolLit(b) => Truth::from_bool(*b),
        SmtTerm::Var(name) => match model.get(name) {
            Some(ModelValue::Bool(b)) => Truth::from_bool(*b),
            _ => Truth::Unknown,
        },
        SmtTerm::Not(inner) => evaluate(inner, model).negate(),
        SmtTerm::And(terms) => {
            let mut saw_unknown = false;
            for t in terms {
                match evaluate(t, model) {
                    Truth::False => return Truth::False,
                    Truth::Unknown => saw_unknown = true,
                    Truth::True => {}
                }
            }
            if saw_unknown {
                Truth::Unknown
            } else {
                Truth::True
            }
        }
        SmtTerm::Or(terms) => {
            let mut saw_unknown = false;
            for t in terms {
                match evaluate(t, model) {
                    Truth::True => return Truth::True,
                    Truth::Unknown => saw_unknown = true,
                    Truth::False => {}
                }
            }
            if saw_unknown {
                Truth::Unknown
            } else {
                Truth::False
            }
        }
        SmtTerm::Implies(lhs, rhs) => match (evaluate(lhs, model), evaluate(rhs, model)) {
            (Truth::False, _) | (_, Truth::True) => Truth::True,
            (Truth::True, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        },
        SmtTerm::Eq(lhs, rhs) => {
            match (evaluate_numeric(lhs, model), evaluate_numeric(rhs, model)) {
                (Some(a), Some(b)) => compare(a, b, Ordering::is_eq),
                _ => match (evaluate(lhs, model), evaluate(rhs, model)) {
                    (Truth::Unknown, _) | (_, Truth::Unknown) => Truth::Unknown,
                    (a, b) => Truth::from_bool(a == b),
                },
            }
        }
        SmtTerm::Lt(lhs, rhs) => relational(lhs, rhs, model, Ordering::is_lt),
        SmtTerm::Le(lhs, rhs) => relational(lhs, rhs, model, Ordering::is_le),
        SmtTerm::Gt(lhs, rhs) => relational(lhs, rhs, model, Ordering::is_gt),
        SmtTerm::Ge(lhs, rhs) => relational(lhs, rhs, model, Ordering::is_ge),
        SmtTerm::Ite(cond, then, els) => match evaluate(cond, model) {
            Truth::True => evaluate(then, model),
            Truth::False => evaluate(els, model),
            Truth::Unknown => Truth::Unknown,
        },
        SmtTerm::IntLit(_)
        | SmtTerm::RealLit(_)
        | SmtTerm::Add(..)
        | SmtTerm::Sub(..)
        | SmtTerm::Mul(..)
        | SmtTerm::Neg(_)
        | SmtTerm::ForAll(..)
        | SmtTerm::Exists(..) => Truth::Unknown,
    }
}

fn relational(
    lhs: &SmtTerm,
    rhs: &SmtTerm,
    model: &Model,
    holds: fn(Ordering) -> bool,
) -> Truth {
    match (evaluate_numeric(lhs, model), evaluate_numeric(rhs, model)) {
        (Some(a), Some(b)) => compare(a, b, holds),
        _ => Truth::Unknown,
    }
}

fn compare(a: Numeric, b: Numeric, holds: fn(Ordering) -> bool) -> Truth {
    match a.compare(b) {
        Some(ord) => Truth::from_bool(holds(ord)),
        None => Truth::Unknown,
    }
}

/// Value of an arithmetic term, or `None` when it is not ground under `model`.
pub fn evaluate_numeric(term: &SmtTerm, model: &Model) -> Option<Numeric> {
    match term {
        SmtTerm::IntLit(n) => Some(Numeric::Int(*n)),
        SmtTerm::RealLit(r) => r.is_finite().then_some(Numeric::Real(*r)),
        SmtTerm::Var(name) => match model.get(name)? {
            ModelValue::Int(n) => Some(Numeric::Int(*n)),
            ModelValue::Real(r) => r.is_finite().then_some(Numeric::Real(*r)),
            ModelValue::Bool(_) | ModelValue::Other(_) => None,
        },
        SmtTerm::Add(lhs, rhs) => arith(lhs, rhs, model, i64::checked_add, |a, b| a + b),
        SmtTerm::Sub(lhs, rhs) => arith(lhs, rhs, model, i64::checked_sub, |a, b| a - b),
        SmtTerm::Mul(lhs, rhs) => arith(lhs, rhs, model, i64::checked_mul, |a, b| a * b),
        SmtTerm::Neg(inner) => match evaluate_numeric(inner, model)? {
            Numeric::Int(n) => n.checked_neg().map(Numeric::Int),
            Numeric::Real(r) => Some(Numeric::Real(-r)),
        },
        SmtTerm::Ite(cond, then, els) => match evaluate(cond, model) {
            Truth::True => evaluate_numeric(then, model),
            Truth::False => evaluate_numeric(els, model),
            Truth::Unknown => None,
        },
        _ => None,
    }
}

fn arith(
    lhs: &SmtTerm,
    rhs: &SmtTerm,
    model: &Model,
    int_op: fn(i64, i64) -> Option<i64>,
    real_op: fn(f64, f64) -> f64,
) -> Option<Numeric> {
    let a = evaluate_numeric(lhs, model)?;
    let b = evaluate_numeric(rhs, model)?;
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => int_op(x, y).map(Numeric::Int),
        (x, y) => {
            let r = real_op(x.as_f64(), y.as_f64());
            r.is_finite().then_some(Numeric::Real(r))
        }
    }
}
