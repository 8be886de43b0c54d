use std::collections::BTreeSet;

use crate::sorts::{Declaration, SmtSort};
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => symbol(name),
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        SmtTerm::RealLit(r) => {
            if *r < 0.0 {
                format!("(- {})", real_numeral(-r))
            } else {
                real_numeral(*r)
            }
        }
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::Add(lhs, rhs) => format!("(+ {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Sub(lhs, rhs) => format!("(- {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Neg(inner) => format!("(- {})", to_smtlib(inner)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => {
            if terms.is_empty() {
                "true".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(and {})", inner.join(" "))
            }
        }
        SmtTerm::Or(terms) => {
            if terms.is_empty() {
                "false".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(or {})", inner.join(" "))
            }
        }
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
        SmtTerm::ForAll(bindings, body) => {
            let vars: Vec<String> = bindings
                .iter()
                .map(|(n, s)| format!("({} {})", symbol(n), sort_to_smtlib(s)))
                .collect();
            format!("(forall ({}) {})", vars.join(" "), to_smtlib(body))
        }
        SmtTerm::Exists(bindings, body) => {
            let vars: Vec<String> = bindings
                .iter()
                .map(|(n, s)| format!("({} {})", symbol(n), sort_to_smtlib(s)))
                .collect();
            format!("(exists ({}) {})", vars.join(" "), to_smtlib(body))
        }
        SmtTerm::Ite(cond, then, els) => {
            format!(
                "(ite {} {} {})",
                to_smtlib(cond),
                to_smtlib(then),
                to_smtlib(els)
            )
        }
    }
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> String {
    match sort {
        SmtSort::Bool => "Bool".to_string(),
        SmtSort::Int => "Int".to_string(),
        SmtSort::Real => "Real".to_string(),
        SmtSort::Uninterpreted(name) => symbol(name),
    }
}

/// Print a declaration as `(declare-const name Sort)`.
pub fn decl_to_smtlib(decl: &Declaration) -> String {
    format!(
        "(declare-const {} {})",
        symbol(&decl.name),
        sort_to_smtlib(&decl.sort)
    )
}

/// `declare-sort` commands for every uninterpreted sort used by `decls`, in
/// name order.
pub fn sort_declarations(decls: &[Declaration]) -> Vec<String> {
    let names: BTreeSet<&str> = decls
        .iter()
        .filter_map(|d| match &d.sort {
            SmtSort::Uninterpreted(name) => Some(name.as_str()),
            _ => None,
        })
        .collect();
    names
        .into_iter()
        .map(|name| format!("(declare-sort {} 0)", symbol(name)))
        .collect()
}

/// Render a symbol, quoting it with `|...|` when it is not a simple symbol.
pub fn symbol(name: &str) -> String {
    if is_simple_symbol(name) {
        name.to_string()
    } else {
        format!("|{}|", name.replace(['|', '\\'], "_"))
    }
}

pub fn is_simple_symbol(name: &str) -> bool {
    const EXTRA: &str = "~!@$%^&*_-+=<>.?/";
    let mut chars = name.chars();
    match chars.next() {
        None => false,
        Some(first) if first.is_ascii_digit() => false,
        Some(first) => {
            (first.is_ascii_alphanumeric() || EXTRA.contains(first))
                && chars.all(|c| c.is_ascii_alphanumeric() || EXTRA.contains(c))
        }
    }
}

fn real_numeral(r: f64) -> String {
    let text = r.to_string();
    if text.contains('.') || !r.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_simple_term() {
        let term = SmtTerm::var("x").add(SmtTerm::int(1)).ge(SmtTerm::int(0));
        assert_eq!(to_smtlib(&term), "(>= (+ x 1) 0)");
    }

    #[test]
    fn print_and_term() {
        let term = SmtTerm::and(vec![
            SmtTerm::var("a").gt(SmtTerm::int(0)),
            SmtTerm::var("b").lt(SmtTerm::int(10)),
        ]);
        assert_eq!(to_smtlib(&term), "(and (> a 0) (< b 10))");
    }

    #[test]
    fn print_negative_and_real_literals() {
        assert_eq!(to_smtlib(&SmtTerm::int(-7)), "(- 7)");
        assert_eq!(to_smtlib(&SmtTerm::int(i64::MIN)), "(- 9223372036854775808)");
        assert_eq!(to_smtlib(&SmtTerm::real(2.0)), "2.0");
        assert_eq!(to_smtlib(&SmtTerm::real(-0.25)), "(- 0.25)");
        assert_eq!(to_smtlib(&SmtTerm::real(1e-7)), "0.0000001");
    }

    #[test]
    fn print_unary_minus() {
        assert_eq!(to_smtlib(&SmtTerm::var("x").neg()), "(- x)");
    }

    #[test]
    fn quotes_symbols_outside_the_simple_alphabet() {
        assert_eq!(symbol("amount"), "amount");
        assert_eq!(symbol("user age"), "|user age|");
        assert_eq!(symbol("9lives"), "|9lives|");
        assert_eq!(symbol("a|b"), "|a_b|");
    }

    #[test]
    fn declarations_and_sorts() {
        let decls = vec![
            Declaration::int("x"),
            Declaration::new("id", SmtSort::Uninterpreted("UUID".into())),
            Declaration::new("other", SmtSort::Uninterpreted("UUID".into())),
        ];
        assert_eq!(decl_to_smtlib(&decls[0]), "(declare-const x Int)");
        assert_eq!(decl_to_smtlib(&decls[1]), "(declare-const id UUID)");
        assert_eq!(sort_declarations(&decls), vec!["(declare-sort UUID 0)"]);
    }
}
