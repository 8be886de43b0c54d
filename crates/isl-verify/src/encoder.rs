//! Translation of specification conditions into solver terms.
//!
//! Conditions arrive as [`SpecExpr`] trees (the checked output of the ISL
//! front end). The encoder resolves identifiers against an
//! [`EncodingContext`], checks sorts, and produces an [`SmtTerm`]. Anything
//! without a sound arithmetic encoding (strings, calls, division) is an
//! [`EncodeError`].

use std::fmt;

use indexmap::IndexMap;
use isl_smt::sorts::{Declaration, SmtSort};
use isl_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};

use crate::error::EncodeError;

/// Identifier bound to the constrained value inside refinement predicates.
pub const VALUE_IDENT: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "not")]
    Not,
    #[serde(rename = "-")]
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "implies")]
    Implies,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Implies => "implies",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// Specification-language expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecExpr {
    Bool {
        value: bool,
    },
    Int {
        value: i64,
    },
    Real {
        value: f64,
    },
    Str {
        value: String,
    },
    Ident {
        name: String,
    },
    /// `object.field`; encoded as the flattened dotted name.
    Member {
        object: Box<SpecExpr>,
        field: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<SpecExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<SpecExpr>,
        right: Box<SpecExpr>,
    },
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<SpecExpr>,
    },
}

#[allow(clippy::should_implement_trait)]
impl SpecExpr {
    pub fn ident(name: impl Into<String>) -> Self {
        SpecExpr::Ident { name: name.into() }
    }

    pub fn int(value: i64) -> Self {
        SpecExpr::Int { value }
    }

    pub fn real(value: f64) -> Self {
        SpecExpr::Real { value }
    }

    pub fn bool(value: bool) -> Self {
        SpecExpr::Bool { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        SpecExpr::Str {
            value: value.into(),
        }
    }

    pub fn member(self, field: impl Into<String>) -> Self {
        SpecExpr::Member {
            object: Box::new(self),
            field: field.into(),
        }
    }

    pub fn not(self) -> Self {
        SpecExpr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    pub fn neg(self) -> Self {
        SpecExpr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }

    pub fn binary(self, op: BinaryOp, right: SpecExpr) -> Self {
        SpecExpr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn and(self, right: SpecExpr) -> Self {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: SpecExpr) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    pub fn eq(self, right: SpecExpr) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn lt(self, right: SpecExpr) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn le(self, right: SpecExpr) -> Self {
        self.binary(BinaryOp::Le, right)
    }

    pub fn gt(self, right: SpecExpr) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn ge(self, right: SpecExpr) -> Self {
        self.binary(BinaryOp::Ge, right)
    }

    pub fn add(self, right: SpecExpr) -> Self {
        self.binary(BinaryOp::Add, right)
    }

    /// Dotted path for identifiers and member chains (`input.amount`).
    pub fn path(&self) -> Option<String> {
        match self {
            SpecExpr::Ident { name } => Some(name.clone()),
            SpecExpr::Member { object, field } => {
                object.path().map(|base| format!("{base}.{field}"))
            }
            _ => None,
        }
    }

    /// Replace every free occurrence of identifier `from` with `to`.
    pub fn rename_ident(&self, from: &str, to: &str) -> SpecExpr {
        match self {
            SpecExpr::Ident { name } if name == from => SpecExpr::ident(to),
            SpecExpr::Member { object, field } => SpecExpr::Member {
                object: Box::new(object.rename_ident(from, to)),
                field: field.clone(),
            },
            SpecExpr::Unary { op, operand } => SpecExpr::Unary {
                op: *op,
                operand: Box::new(operand.rename_ident(from, to)),
            },
            SpecExpr::Binary { op, left, right } => SpecExpr::Binary {
                op: *op,
                left: Box::new(left.rename_ident(from, to)),
                right: Box::new(right.rename_ident(from, to)),
            },
            SpecExpr::Call { callee, args } => SpecExpr::Call {
                callee: callee.clone(),
                args: args.iter().map(|a| a.rename_ident(from, to)).collect(),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for SpecExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecExpr::Bool { value } => write!(f, "{value}"),
            SpecExpr::Int { value } => write!(f, "{value}"),
            SpecExpr::Real { value } => write!(f, "{value:?}"),
            SpecExpr::Str { value } => write!(f, "{value:?}"),
            SpecExpr::Ident { name } => write!(f, "{name}"),
            SpecExpr::Member { object, field } => write!(f, "{object}.{field}"),
            SpecExpr::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "not {}", Operand(operand)),
            SpecExpr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "-{}", Operand(operand)),
            SpecExpr::Binary { op, left, right } => {
                write!(f, "{} {} {}", Operand(left), op.symbol(), Operand(right))
            }
            SpecExpr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parenthesizes compound operands.
struct Operand<'a>(&'a SpecExpr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            SpecExpr::Binary { .. } | SpecExpr::Unary { .. } => write!(f, "({})", self.0),
            other => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single pre/postcondition or invariant clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub expr: SpecExpr,
    /// Original clause text; falls back to the rendered expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Condition {
    pub fn new(expr: SpecExpr) -> Self {
        Self {
            expr,
            text: None,
            location: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.location = Some(SourceLocation { line, column });
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn source_text(&self) -> String {
        self.text.clone().unwrap_or_else(|| self.expr.to_string())
    }
}

impl From<SpecExpr> for Condition {
    fn from(expr: SpecExpr) -> Self {
        Condition::new(expr)
    }
}

/// Refinement-type constraint attached to a named type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeConstraint {
    Min { value: f64 },
    Max { value: f64 },
    GreaterThan { value: f64 },
    LessThan { value: f64 },
    /// Boolean expression over [`VALUE_IDENT`].
    Predicate { expr: SpecExpr },
    MinLength { value: u64 },
    MaxLength { value: u64 },
    Pattern { regex: String },
}

impl fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeConstraint::Min { value } => write!(f, "{VALUE_IDENT} >= {value}"),
            TypeConstraint::Max { value } => write!(f, "{VALUE_IDENT} <= {value}"),
            TypeConstraint::GreaterThan { value } => write!(f, "{VALUE_IDENT} > {value}"),
            TypeConstraint::LessThan { value } => write!(f, "{VALUE_IDENT} < {value}"),
            TypeConstraint::Predicate { expr } => write!(f, "{expr}"),
            TypeConstraint::MinLength { value } => write!(f, "length({VALUE_IDENT}) >= {value}"),
            TypeConstraint::MaxLength { value } => write!(f, "length({VALUE_IDENT}) <= {value}"),
            TypeConstraint::Pattern { regex } => write!(f, "matches({VALUE_IDENT}, /{regex}/)"),
        }
    }
}

/// Ordered variable-name to sort mapping used while encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingContext {
    vars: IndexMap<String, SmtSort>,
}

/// Fresh, empty encoding context.
pub fn create_context() -> EncodingContext {
    EncodingContext::default()
}

impl EncodingContext {
    /// Declare (or redeclare) a variable.
    pub fn declare(&mut self, name: impl Into<String>, sort: SmtSort) -> &mut Self {
        self.vars.insert(name.into(), sort);
        self
    }

    /// Declare a variable by its ISL type name.
    pub fn declare_isl(&mut self, name: impl Into<String>, isl_type: &str) -> &mut Self {
        self.declare(name, isl_type_to_sort(isl_type))
    }

    pub fn sort_of(&self, name: &str) -> Option<&SmtSort> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Declarations in declaration order.
    pub fn declarations(&self) -> Vec<Declaration> {
        self.vars
            .iter()
            .map(|(name, sort)| Declaration::new(name.clone(), sort.clone()))
            .collect()
    }
}

/// Map an ISL type name to a solver sort.
pub fn isl_type_to_sort(type_name: &str) -> SmtSort {
    match type_name {
        "Boolean" | "Bool" => SmtSort::Bool,
        "Int" | "Integer" | "Timestamp" | "Duration" => SmtSort::Int,
        "Decimal" | "Float" | "Number" | "Money" | "Real" => SmtSort::Real,
        other => SmtSort::Uninterpreted(other.to_string()),
    }
}

/// Encode a boolean condition.
pub fn encode_condition(
    condition: &Condition,
    ctx: &EncodingContext,
) -> Result<SmtTerm, EncodeError> {
    encode_bool(&condition.expr, ctx)
}

/// Encode a refinement constraint on `var_name`.
pub fn encode_type_constraint(
    constraint: &TypeConstraint,
    var_name: &str,
    ctx: &EncodingContext,
) -> Result<SmtTerm, EncodeError> {
    let bound = |value: f64| -> Result<(SmtTerm, SmtTerm), EncodeError> {
        let sort = ctx
            .sort_of(var_name)
            .ok_or_else(|| EncodeError::UnknownIdentifier {
                name: var_name.to_string(),
            })?;
        if !sort.is_numeric() {
            return Err(EncodeError::mismatch(constraint, "a numeric type", sort));
        }
        if !value.is_finite() {
            return Err(EncodeError::NonFiniteReal { value });
        }
        let lit = if *sort == SmtSort::Int && is_whole(value) {
            SmtTerm::int(value as i64)
        } else {
            SmtTerm::real(value)
        };
        Ok((SmtTerm::var(var_name), lit))
    };

    match constraint {
        TypeConstraint::Min { value } => bound(*value).map(|(v, lit)| v.ge(lit)),
        TypeConstraint::Max { value } => bound(*value).map(|(v, lit)| v.le(lit)),
        TypeConstraint::GreaterThan { value } => bound(*value).map(|(v, lit)| v.gt(lit)),
        TypeConstraint::LessThan { value } => bound(*value).map(|(v, lit)| v.lt(lit)),
        TypeConstraint::Predicate { expr } => {
            encode_bool(&expr.rename_ident(VALUE_IDENT, var_name), ctx)
        }
        TypeConstraint::MinLength { .. }
        | TypeConstraint::MaxLength { .. }
        | TypeConstraint::Pattern { .. } => Err(EncodeError::StringConstraint {
            constraint: constraint.to_string(),
        }),
    }
}

pub(crate) fn is_whole(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15
}

fn encode_bool(expr: &SpecExpr, ctx: &EncodingContext) -> Result<SmtTerm, EncodeError> {
    let (term, sort) = encode(expr, ctx)?;
    if sort == SmtSort::Bool {
        Ok(term)
    } else {
        Err(EncodeError::mismatch(expr, "Bool", sort))
    }
}

fn encode_numeric(expr: &SpecExpr, ctx: &EncodingContext) -> Result<(SmtTerm, SmtSort), EncodeError> {
    let (term, sort) = encode(expr, ctx)?;
    if sort.is_numeric() {
        Ok((term, sort))
    } else {
        Err(EncodeError::mismatch(expr, "a numeric type", sort))
    }
}

fn encode(expr: &SpecExpr, ctx: &EncodingContext) -> Result<(SmtTerm, SmtSort), EncodeError> {
    match expr {
        SpecExpr::Bool { value } => Ok((SmtTerm::bool(*value), SmtSort::Bool)),
        SpecExpr::Int { value } => Ok((SmtTerm::int(*value), SmtSort::Int)),
        SpecExpr::Real { value } => {
            if value.is_finite() {
                Ok((SmtTerm::real(*value), SmtSort::Real))
            } else {
                Err(EncodeError::NonFiniteReal { value: *value })
            }
        }
        SpecExpr::Str { value } => Err(EncodeError::StringLiteral {
            value: value.clone(),
        }),
        SpecExpr::Ident { .. } | SpecExpr::Member { .. } => {
            let name = expr.path().ok_or_else(|| EncodeError::UnsupportedOperator {
                op: format!("member access on `{expr}`"),
            })?;
            match ctx.sort_of(&name) {
                Some(sort) => Ok((SmtTerm::var(name), sort.clone())),
                None => Err(EncodeError::UnknownIdentifier { name }),
            }
        }
        SpecExpr::Call { callee, .. } => Err(EncodeError::UnsupportedCall {
            callee: callee.clone(),
        }),
        SpecExpr::Unary {
            op: UnaryOp::Not,
            operand,
        } => Ok((encode_bool(operand, ctx)?.not(), SmtSort::Bool)),
        SpecExpr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => {
            let (term, sort) = encode_numeric(operand, ctx)?;
            let negated = match term {
                SmtTerm::IntLit(n) => n.checked_neg().map(SmtTerm::int),
                SmtTerm::RealLit(r) => Some(SmtTerm::real(-r)),
                _ => None,
            };
            Ok((negated.unwrap_or_else(|| term.neg()), sort))
        }
        SpecExpr::Binary { op, left, right } => encode_binary(expr, *op, left, right, ctx),
    }
}

fn encode_binary(
    whole: &SpecExpr,
    op: BinaryOp,
    left: &SpecExpr,
    right: &SpecExpr,
    ctx: &EncodingContext,
) -> Result<(SmtTerm, SmtSort), EncodeError> {
    match op {
        BinaryOp::And | BinaryOp::Or | BinaryOp::Implies => {
            let l = encode_bool(left, ctx)?;
            let r = encode_bool(right, ctx)?;
            let term = match op {
                BinaryOp::And => SmtTerm::and(flatten_and(l, r)),
                BinaryOp::Or => SmtTerm::or(vec![l, r]),
                _ => l.implies(r),
            };
            Ok((term, SmtSort::Bool))
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let (l, ls) = encode(left, ctx)?;
            let (r, rs) = encode(right, ctx)?;
            let (l, r) = if ls == rs {
                (l, r)
            } else if ls.is_numeric() && rs.is_numeric() {
                coerce(l, &ls, r, &rs)
            } else {
                return Err(EncodeError::mismatch(whole, ls.to_string(), rs));
            };
            let eq = l.eq(r);
            let term = if op == BinaryOp::Ne { eq.not() } else { eq };
            Ok((term, SmtSort::Bool))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let (l, ls) = encode_numeric(left, ctx)?;
            let (r, rs) = encode_numeric(right, ctx)?;
            let (l, r) = coerce(l, &ls, r, &rs);
            let term = match op {
                BinaryOp::Lt => l.lt(r),
                BinaryOp::Le => l.le(r),
                BinaryOp::Gt => l.gt(r),
                _ => l.ge(r),
            };
            Ok((term, SmtSort::Bool))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
            let (l, ls) = encode_numeric(left, ctx)?;
            let (r, rs) = encode_numeric(right, ctx)?;
            let sort = if ls == SmtSort::Real || rs == SmtSort::Real {
                SmtSort::Real
            } else {
                SmtSort::Int
            };
            let (l, r) = coerce(l, &ls, r, &rs);
            let term = match op {
                BinaryOp::Add => l.add(r),
                BinaryOp::Sub => l.sub(r),
                _ => l.mul(r),
            };
            Ok((term, sort))
        }
        BinaryOp::Div => Err(EncodeError::UnsupportedOperator {
            op: op.symbol().to_string(),
        }),
    }
}

/// `a and b and c` parses left-nested; keep the conjunction flat.
fn flatten_and(l: SmtTerm, r: SmtTerm) -> Vec<SmtTerm> {
    let mut out = match l {
        SmtTerm::And(terms) => terms,
        other => vec![other],
    };
    out.push(r);
    out
}

/// Integer literals facing a real operand become real literals.
fn coerce(l: SmtTerm, ls: &SmtSort, r: SmtTerm, rs: &SmtSort) -> (SmtTerm, SmtTerm) {
    let lift = |term: SmtTerm, other: &SmtSort| match (term, other) {
        (SmtTerm::IntLit(n), SmtSort::Real) => SmtTerm::real(n as f64),
        (term, _) => term,
    };
    (lift(l, rs), lift(r, ls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_smt::backends::smtlib_printer::to_smtlib;

    fn ctx() -> EncodingContext {
        let mut ctx = create_context();
        ctx.declare("x", SmtSort::Int)
            .declare("rate", SmtSort::Real)
            .declare("active", SmtSort::Bool)
            .declare("input.amount", SmtSort::Int)
            .declare_isl("email", "Email");
        ctx
    }

    fn encode_text(expr: SpecExpr) -> Result<String, EncodeError> {
        encode_condition(&Condition::new(expr), &ctx()).map(|t| to_smtlib(&t))
    }

    #[test]
    fn isl_types_map_to_sorts() {
        assert_eq!(isl_type_to_sort("Boolean"), SmtSort::Bool);
        assert_eq!(isl_type_to_sort("Timestamp"), SmtSort::Int);
        assert_eq!(isl_type_to_sort("Money"), SmtSort::Real);
        assert_eq!(
            isl_type_to_sort("UUID"),
            SmtSort::Uninterpreted("UUID".into())
        );
    }

    #[test]
    fn encodes_relational_and_logical_operators() {
        let expr = SpecExpr::ident("x")
            .gt(SpecExpr::int(0))
            .and(SpecExpr::ident("x").lt(SpecExpr::int(100)))
            .and(SpecExpr::ident("active"));
        assert_eq!(
            encode_text(expr).as_deref(),
            Ok("(and (> x 0) (< x 100) active)")
        );

        let ne = SpecExpr::ident("x").binary(BinaryOp::Ne, SpecExpr::int(-3));
        assert_eq!(encode_text(ne).as_deref(), Ok("(not (= x (- 3)))"));
    }

    #[test]
    fn member_access_resolves_to_dotted_names() {
        let expr = SpecExpr::ident("input")
            .member("amount")
            .ge(SpecExpr::int(1));
        assert_eq!(encode_text(expr).as_deref(), Ok("(>= input.amount 1)"));
    }

    #[test]
    fn integer_literals_are_lifted_next_to_reals() {
        let expr = SpecExpr::ident("rate").le(SpecExpr::int(1));
        assert_eq!(encode_text(expr).as_deref(), Ok("(<= rate 1.0)"));
    }

    #[test]
    fn rejects_what_has_no_encoding() {
        assert!(matches!(
            encode_text(SpecExpr::ident("missing").gt(SpecExpr::int(0))),
            Err(EncodeError::UnknownIdentifier { name }) if name == "missing"
        ));
        assert!(matches!(
            encode_text(SpecExpr::ident("x")),
            Err(EncodeError::SortMismatch { .. })
        ));
        assert!(matches!(
            encode_text(SpecExpr::ident("active").gt(SpecExpr::int(0))),
            Err(EncodeError::SortMismatch { .. })
        ));
        assert!(matches!(
            encode_text(
                SpecExpr::ident("x")
                    .binary(BinaryOp::Div, SpecExpr::int(2))
                    .gt(SpecExpr::int(0))
            ),
            Err(EncodeError::UnsupportedOperator { op }) if op == "/"
        ));
        assert!(matches!(
            encode_text(SpecExpr::Call {
                callee: "is_valid".into(),
                args: vec![SpecExpr::ident("x")]
            }),
            Err(EncodeError::UnsupportedCall { .. })
        ));
        assert!(matches!(
            encode_text(SpecExpr::ident("email").eq(SpecExpr::string("a@b.c"))),
            Err(EncodeError::StringLiteral { .. })
        ));
        assert!(matches!(
            encode_text(SpecExpr::ident("rate").gt(SpecExpr::real(f64::NAN))),
            Err(EncodeError::NonFiniteReal { .. })
        ));
    }

    #[test]
    fn uninterpreted_values_compare_for_equality_only() {
        let mut ctx = ctx();
        ctx.declare_isl("other", "Email");
        let eq = Condition::new(SpecExpr::ident("email").eq(SpecExpr::ident("other")));
        assert_eq!(
            encode_condition(&eq, &ctx).map(|t| to_smtlib(&t)).as_deref(),
            Ok("(= email other)")
        );
        let lt = Condition::new(SpecExpr::ident("email").lt(SpecExpr::ident("other")));
        assert!(encode_condition(&lt, &ctx).is_err());
    }

    #[test]
    fn type_constraints_encode_over_the_variable() {
        let ctx = ctx();
        let min = encode_type_constraint(&TypeConstraint::Min { value: 0.0 }, "x", &ctx);
        assert_eq!(min.map(|t| to_smtlib(&t)).as_deref(), Ok("(>= x 0)"));

        let lt = encode_type_constraint(&TypeConstraint::LessThan { value: 0.5 }, "rate", &ctx);
        assert_eq!(lt.map(|t| to_smtlib(&t)).as_deref(), Ok("(< rate 0.5)"));

        let pred = TypeConstraint::Predicate {
            expr: SpecExpr::ident(VALUE_IDENT).ge(SpecExpr::int(18)),
        };
        assert_eq!(
            encode_type_constraint(&pred, "x", &ctx)
                .map(|t| to_smtlib(&t))
                .as_deref(),
            Ok("(>= x 18)")
        );
    }

    #[test]
    fn string_constraints_fail_to_encode() {
        let ctx = ctx();
        for constraint in [
            TypeConstraint::MinLength { value: 3 },
            TypeConstraint::MaxLength { value: 255 },
            TypeConstraint::Pattern {
                regex: "^[a-z]+$".into(),
            },
        ] {
            let err = encode_type_constraint(&constraint, "email", &ctx);
            assert!(matches!(err, Err(EncodeError::StringConstraint { .. })));
        }
        let err = encode_type_constraint(&TypeConstraint::Min { value: 1.0 }, "email", &ctx);
        assert!(matches!(err, Err(EncodeError::SortMismatch { .. })));
    }

    #[test]
    fn display_renders_source_like_text() {
        let expr = SpecExpr::ident("input")
            .member("amount")
            .add(SpecExpr::int(1))
            .gt(SpecExpr::real(2.5))
            .and(SpecExpr::ident("active").not());
        assert_eq!(
            expr.to_string(),
            "((input.amount + 1) > 2.5) and (not active)"
        );
    }

    #[test]
    fn spec_expr_deserializes_from_tagged_json() {
        let json = r#"{
            "kind": "binary", "op": ">=",
            "left": {"kind": "ident", "name": "x"},
            "right": {"kind": "int", "value": 0}
        }"#;
        let expr: SpecExpr = serde_json::from_str(json).expect("valid expression json");
        assert_eq!(expr, SpecExpr::ident("x").ge(SpecExpr::int(0)));
    }
}
