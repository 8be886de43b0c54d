use std::collections::HashMap;

use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::backends::sexpr;
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Sort mismatch: {0}")]
    SortMismatch(String),
    #[error("Unsupported sort for in-process Z3: {0}")]
    UnsupportedSort(String),
    #[error("Literal {0} has no exact rational form")]
    InexactLiteral(f64),
}

/// In-process Z3 backend. Supports Bool, Int and Real constants.
pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, z3::ast::Int>,
    real_vars: HashMap<String, z3::ast::Real>,
    bool_vars: HashMap<String, z3::ast::Bool>,
    last_assumption_names: Vec<String>,
    last_assumption_terms: Vec<z3::ast::Bool>,
    params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            int_vars: HashMap::new(),
            real_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            last_assumption_names: Vec::new(),
            last_assumption_terms: Vec::new(),
            params: None,
        }
    }

    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        let mut solver = Self::new();
        solver.apply_timeout(timeout_ms);
        solver
    }

    fn apply_timeout(&mut self, timeout_ms: u64) {
        if timeout_ms == 0 {
            self.params = None;
            return;
        }
        let mut params = z3::Params::new();
        let ms = u32::try_from(timeout_ms).unwrap_or(u32::MAX);
        params.set_u32("timeout", ms);
        params.set_u32("solver2_timeout", ms);
        self.solver.set_params(&params);
        self.params = Some(params);
    }

    fn unknown(&self) -> SatResult {
        SatResult::Unknown(
            self.solver
                .get_reason_unknown()
                .unwrap_or_else(|| "Z3 returned unknown".into()),
        )
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else if let Some(v) = self.real_vars.get(name) {
                    Ok(Z3Term::Real(v.clone()))
                } else if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(z3::ast::Int::from_i64(*n))),
            SmtTerm::RealLit(r) => {
                let (num, den) = rational(*r).ok_or(Z3Error::InexactLiteral(*r))?;
                let num = z3::ast::Int::from_i64(num).to_real();
                let den = z3::ast::Int::from_i64(den).to_real();
                Ok(Z3Term::Real(&num / &den))
            }
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => match self.arith(lhs, rhs)? {
                Arith::Int(l, r) => Ok(Z3Term::Int(&l + &r)),
                Arith::Real(l, r) => Ok(Z3Term::Real(&l + &r)),
            },
            SmtTerm::Sub(lhs, rhs) => match self.arith(lhs, rhs)? {
                Arith::Int(l, r) => Ok(Z3Term::Int(&l - &r)),
                Arith::Real(l, r) => Ok(Z3Term::Real(&l - &r)),
            },
            SmtTerm::Mul(lhs, rhs) => match self.arith(lhs, rhs)? {
                Arith::Int(l, r) => Ok(Z3Term::Int(&l * &r)),
                Arith::Real(l, r) => Ok(Z3Term::Real(&l * &r)),
            },
            SmtTerm::Neg(inner) => match self.translate_term(inner)? {
                Z3Term::Int(i) => Ok(Z3Term::Int(i.unary_minus())),
                Z3Term::Real(r) => Ok(Z3Term::Real(r.unary_minus())),
                Z3Term::Bool(_) => Err(Z3Error::SortMismatch("negation of Bool".into())),
            },
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs)?;
                let r = self.translate_term(rhs)?;
                match (l, r) {
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    (l, r) => match promote(l, r)? {
                        Arith::Int(li, ri) => Ok(Z3Term::Bool(li.eq(&ri))),
                        Arith::Real(lr, rr) => Ok(Z3Term::Bool(lr.eq(&rr))),
                    },
                }
            }
            SmtTerm::Lt(lhs, rhs) => match self.arith(lhs, rhs)? {
                Arith::Int(l, r) => Ok(Z3Term::Bool(l.lt(&r))),
                Arith::Real(l, r) => Ok(Z3Term::Bool(l.lt(&r))),
            },
            SmtTerm::Le(lhs, rhs) => match self.arith(lhs, rhs)? {
                Arith::Int(l, r) => Ok(Z3Term::Bool(l.le(&r))),
                Arith::Real(l, r) => Ok(Z3Term::Bool(l.le(&r))),
            },
            SmtTerm::Gt(lhs, rhs) => match self.arith(lhs, rhs)? {
                Arith::Int(l, r) => Ok(Z3Term::Bool(l.gt(&r))),
                Arith::Real(l, r) => Ok(Z3Term::Bool(l.gt(&r))),
            },
            SmtTerm::Ge(lhs, rhs) => match self.arith(lhs, rhs)? {
                Arith::Int(l, r) => Ok(Z3Term::Bool(l.ge(&r))),
                Arith::Real(l, r) => Ok(Z3Term::Bool(l.ge(&r))),
            },
            SmtTerm::And(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_bool()?;
                let r = self.translate_term(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond)?.into_bool()?;
                let t = self.translate_term(then)?;
                let e = self.translate_term(els)?;
                match (t, e) {
                    (Z3Term::Bool(tb), Z3Term::Bool(eb)) => Ok(Z3Term::Bool(c.ite(&tb, &eb))),
                    (t, e) => match promote(t, e)? {
                        Arith::Int(ti, ei) => Ok(Z3Term::Int(c.ite(&ti, &ei))),
                        Arith::Real(tr, er) => Ok(Z3Term::Real(c.ite(&tr, &er))),
                    },
                }
            }
            SmtTerm::ForAll(_, _) | SmtTerm::Exists(_, _) => Err(Z3Error::Internal(
                "Quantifiers are not supported by the in-process backend".into(),
            )),
        }
    }

    fn translate_bools(&self, terms: &[SmtTerm]) -> Result<Vec<z3::ast::Bool>, Z3Error> {
        terms
            .iter()
            .map(|t| self.translate_term(t).and_then(Z3Term::into_bool))
            .collect()
    }

    fn arith(&self, lhs: &SmtTerm, rhs: &SmtTerm) -> Result<Arith, Z3Error> {
        promote(self.translate_term(lhs)?, self.translate_term(rhs)?)
    }

    fn status(&self, result: Z3SatResult) -> SatResult {
        match result {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => self.unknown(),
        }
    }
}

enum Z3Term {
    Int(z3::ast::Int),
    Real(z3::ast::Real),
    Bool(z3::ast::Bool),
}

enum Arith {
    Int(z3::ast::Int, z3::ast::Int),
    Real(z3::ast::Real, z3::ast::Real),
}

impl Z3Term {
    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) | Z3Term::Real(_) => {
                Err(Z3Error::SortMismatch("expected Bool, got a number".into()))
            }
        }
    }
}

/// Mixed Int/Real operands are lifted to Real.
fn promote(l: Z3Term, r: Z3Term) -> Result<Arith, Z3Error> {
    match (l, r) {
        (Z3Term::Int(l), Z3Term::Int(r)) => Ok(Arith::Int(l, r)),
        (Z3Term::Real(l), Z3Term::Real(r)) => Ok(Arith::Real(l, r)),
        (Z3Term::Int(l), Z3Term::Real(r)) => Ok(Arith::Real(l.to_real(), r)),
        (Z3Term::Real(l), Z3Term::Int(r)) => Ok(Arith::Real(l, r.to_real())),
        _ => Err(Z3Error::SortMismatch(
            "expected numeric operands, got Bool".into(),
        )),
    }
}

/// Exact `num / den` form of a finite decimal.
fn rational(r: f64) -> Option<(i64, i64)> {
    if !r.is_finite() {
        return None;
    }
    let text = format!("{}", r.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let den = 10i64.checked_pow(u32::try_from(frac.len()).ok()?)?;
    let num: i64 = format!("{whole}{frac}").parse().ok()?;
    Some((if r < 0.0 { -num } else { num }, den))
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        match sort {
            SmtSort::Int => {
                let v = z3::ast::Int::new_const(name);
                self.int_vars.insert(name.to_string(), v);
            }
            SmtSort::Real => {
                let v = z3::ast::Real::new_const(name);
                self.real_vars.insert(name.to_string(), v);
            }
            SmtSort::Bool => {
                let v = z3::ast::Bool::new_const(name);
                self.bool_vars.insert(name.to_string(), v);
            }
            SmtSort::Uninterpreted(sort_name) => {
                return Err(Z3Error::UnsupportedSort(sort_name.clone()));
            }
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        let result = self.solver.check();
        Ok(self.status(result))
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => {
                let z3_model = self
                    .solver
                    .get_model()
                    .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
                let mut model = Model::new();

                for &(name, sort) in var_names {
                    let value = match sort {
                        SmtSort::Int => self
                            .int_vars
                            .get(name)
                            .and_then(|v| z3_model.eval::<z3::ast::Int>(v, true))
                            .and_then(|val| val.as_i64())
                            .map(ModelValue::Int),
                        SmtSort::Real => self
                            .real_vars
                            .get(name)
                            .and_then(|v| z3_model.eval::<z3::ast::Real>(v, true))
                            .and_then(|val| sexpr::parse(&val.to_string()).ok())
                            .map(|expr| sexpr::to_model_value(&expr, sort)),
                        SmtSort::Bool => self
                            .bool_vars
                            .get(name)
                            .and_then(|v| z3_model.eval::<z3::ast::Bool>(v, true))
                            .and_then(|val| val.as_bool())
                            .map(ModelValue::Bool),
                        SmtSort::Uninterpreted(_) => None,
                    };
                    if let Some(value) = value {
                        model.insert(name, value);
                    }
                }

                Ok((SatResult::Sat, Some(model)))
            }
            Z3SatResult::Unsat => Ok((SatResult::Unsat, None)),
            Z3SatResult::Unknown => Ok((self.unknown(), None)),
        }
    }

    fn supports_assumption_unsat_core(&self) -> bool {
        true
    }

    fn check_sat_assuming(&mut self, assumptions: &[String]) -> Result<SatResult, Z3Error> {
        let mut asts = Vec::with_capacity(assumptions.len());
        for name in assumptions {
            let Some(var) = self.bool_vars.get(name) else {
                return Err(Z3Error::UnknownVariable(name.clone()));
            };
            asts.push(var.clone());
        }
        self.last_assumption_names = assumptions.to_vec();
        self.last_assumption_terms = asts.clone();
        let result = self.solver.check_assumptions(&asts);
        Ok(self.status(result))
    }

    fn get_unsat_core_assumptions(&mut self) -> Result<Vec<String>, Z3Error> {
        let core = self.solver.get_unsat_core();
        let mut out = Vec::new();
        for core_lit in core {
            if let Some(idx) = self
                .last_assumption_terms
                .iter()
                .position(|lit| *lit == core_lit)
            {
                out.push(self.last_assumption_names[idx].clone());
            }
        }
        Ok(out)
    }

    fn set_timeout_ms(&mut self, timeout_ms: u64) -> Result<(), Z3Error> {
        self.apply_timeout(timeout_ms);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply timeout if configured.
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.int_vars.clear();
        self.real_vars.clear();
        self.bool_vars.clear();
        self.last_assumption_names.clear();
        self.last_assumption_terms.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn rational_literals_are_exact() {
        assert_eq!(rational(2.5), Some((25, 10)));
        assert_eq!(rational(-0.125), Some((-125, 1000)));
        assert_eq!(rational(3.0), Some((3, 1)));
        assert_eq!(rational(f64::NAN), None);
    }

    #[test]
    fn z3_basic_unsat() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&SmtTerm::and(vec![
            SmtTerm::var("x").gt(SmtTerm::int(0)),
            SmtTerm::var("x").lt(SmtTerm::int(0)),
        ]))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn z3_real_model_extraction() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("rate", &SmtSort::Real)?;
        solver.assert(&SmtTerm::var("rate").eq(SmtTerm::real(0.25)))?;

        let (result, model) = solver.check_sat_with_model(&[("rate", &SmtSort::Real)])?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get_real("rate"), Some(0.25));
        Ok(())
    }

    #[test]
    fn z3_mixed_int_real_comparison() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("n", &SmtSort::Int)?;
        solver.assert(&SmtTerm::and(vec![
            SmtTerm::var("n").gt(SmtTerm::real(1.5)),
            SmtTerm::var("n").lt(SmtTerm::real(2.5)),
        ]))?;
        let (result, model) = solver.check_sat_with_model(&[("n", &SmtSort::Int)])?;
        assert_eq!(result, SatResult::Sat);
        assert_eq!(model.and_then(|m| m.get_int("n")), Some(2));
        Ok(())
    }

    #[test]
    fn z3_assumption_unsat_core_roundtrip() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", &SmtSort::Int)?;
        solver.declare_var("a", &SmtSort::Bool)?;
        solver.declare_var("b", &SmtSort::Bool)?;
        solver.declare_var("c", &SmtSort::Bool)?;

        solver.assert(&SmtTerm::var("a").implies(SmtTerm::var("x").gt(SmtTerm::int(0))))?;
        solver.assert(&SmtTerm::var("b").implies(SmtTerm::var("x").lt(SmtTerm::int(0))))?;
        solver.assert(&SmtTerm::var("c").implies(SmtTerm::var("x").lt(SmtTerm::int(100))))?;

        let sat = solver.check_sat_assuming(&["a".into(), "b".into(), "c".into()])?;
        assert_eq!(sat, SatResult::Unsat);

        let core = solver.get_unsat_core_assumptions()?;
        assert!(core.contains(&"a".to_string()));
        assert!(core.contains(&"b".to_string()));
        Ok(())
    }

    #[test]
    fn z3_timeout_configuration_survives_reset() -> TestResult {
        let mut solver = Z3Solver::with_timeout_ms(2_000);
        assert!(solver.params.is_some());

        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);

        solver.reset()?;
        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(2)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        assert!(solver.params.is_some());
        Ok(())
    }

    #[test]
    fn z3_rejects_uninterpreted_sorts_and_quantifiers() -> TestResult {
        let mut solver = Z3Solver::new();
        let err = solver.declare_var("id", &SmtSort::Uninterpreted("UUID".into()));
        assert!(matches!(err, Err(Z3Error::UnsupportedSort(_))));

        solver.declare_var("x", &SmtSort::Int)?;
        let forall = SmtTerm::ForAll(
            vec![("y".to_string(), SmtSort::Int)],
            Box::new(SmtTerm::var("x").gt(SmtTerm::var("y"))),
        );
        assert!(solver.assert(&forall).is_err());
        Ok(())
    }
}
