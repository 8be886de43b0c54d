use std::collections::BTreeSet;

use crate::sorts::SmtSort;

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Real literal. Always finite when produced by the encoder.
    RealLit(f64),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),
    Neg(Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // Quantifiers (printed, never evaluated)
    ForAll(Vec<(String, SmtSort)>, Box<SmtTerm>),
    Exists(Vec<(String, SmtSort)>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn real(r: f64) -> Self {
        SmtTerm::RealLit(r)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn neg(self) -> Self {
        SmtTerm::Neg(Box::new(self))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    /// Top-level conjuncts: the operands of an `And`, otherwise the term itself.
    pub fn conjuncts(&self) -> Vec<&SmtTerm> {
        match self {
            SmtTerm::And(terms) => terms.iter().collect(),
            other => vec![other],
        }
    }

    /// Names of all variables occurring free in the term, sorted.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_free_vars(self, &mut Vec::new(), &mut out);
        out
    }
}

fn collect_free_vars(term: &SmtTerm, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
    match term {
        SmtTerm::Var(name) => {
            if !bound.iter().any(|b| b == name) {
                out.insert(name.clone());
            }
        }
        SmtTerm::IntLit(_) | SmtTerm::RealLit(_) | SmtTerm::BoolLit(_) => {}
        SmtTerm::Neg(inner) | SmtTerm::Not(inner) => collect_free_vars(inner, bound, out),
        SmtTerm::Add(l, r)
        | SmtTerm::Sub(l, r)
        | SmtTerm::Mul(l, r)
        | SmtTerm::Eq(l, r)
        | SmtTerm::Lt(l, r)
        | SmtTerm::Le(l, r)
        | SmtTerm::Gt(l, r)
        | SmtTerm::Ge(l, r)
        | SmtTerm::Implies(l, r) => {
            collect_free_vars(l, bound, out);
            collect_free_vars(r, bound, out);
        }
        SmtTerm::And(terms) | SmtTerm::Or(terms) => {
            for t in terms {
                collect_free_vars(t, bound, out);
            }
        }
        SmtTerm::ForAll(bindings, body) | SmtTerm::Exists(bindings, body) => {
            let depth = bound.len();
            bound.extend(bindings.iter().map(|(name, _)| name.clone()));
            collect_free_vars(body, bound, out);
            bound.truncate(depth);
        }
        SmtTerm::Ite(c, t, e) => {
            collect_free_vars(c, bound, out);
            collect_free_vars(t, bound, out);
            collect_free_vars(e, bound, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjuncts_flattens_only_the_top_level() {
        let inner = SmtTerm::and(vec![SmtTerm::var("a"), SmtTerm::var("b")]);
        let term = SmtTerm::and(vec![inner.clone(), SmtTerm::var("c")]);
        assert_eq!(term.conjuncts(), vec![&inner, &SmtTerm::var("c")]);

        let single = SmtTerm::var("x").gt(SmtTerm::int(0));
        assert_eq!(single.conjuncts(), vec![&single]);
    }

    #[test]
    fn free_variables_skips_quantifier_bindings() {
        let term = SmtTerm::and(vec![
            SmtTerm::var("x").gt(SmtTerm::int(0)),
            SmtTerm::ForAll(
                vec![("y".to_string(), SmtSort::Int)],
                Box::new(SmtTerm::var("y").lt(SmtTerm::var("z"))),
            ),
        ]);
        let vars: Vec<String> = term.free_variables().into_iter().collect();
        assert_eq!(vars, vec!["x".to_string(), "z".to_string()]);
    }
}
