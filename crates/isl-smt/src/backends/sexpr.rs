//! Minimal reader for solver responses.

use thiserror::Error;

use crate::solver::ModelValue;
use crate::sorts::SmtSort;

#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    Atom(String),
    /// String literal with the surrounding quotes removed.
    Str(String),
    List(Vec<SExpr>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SExprError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected `)` at offset {0}")]
    UnexpectedClose(usize),
    #[error("trailing input at offset {0}")]
    Trailing(usize),
}

impl SExpr {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Atom or string payload.
    pub fn text(&self) -> Option<&str> {
        match self {
            SExpr::Atom(a) | SExpr::Str(a) => Some(a),
            SExpr::List(_) => None,
        }
    }
}

impl std::fmt::Display for SExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Atom(a) => write!(f, "{a}"),
            SExpr::Str(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse exactly one s-expression.
pub fn parse(input: &str) -> Result<SExpr, SExprError> {
    let mut reader = Reader {
        chars: input.char_indices().collect(),
        pos: 0,
    };
    let expr = reader.expr()?;
    reader.skip_ws();
    if reader.pos < reader.chars.len() {
        return Err(SExprError::Trailing(reader.chars[reader.pos].0));
    }
    Ok(expr)
}

/// True once `text` holds at least one complete top-level expression.
pub fn is_complete(text: &str) -> bool {
    let mut depth = 0i64;
    let mut in_string = false;
    let mut in_symbol = false;
    let mut seen_token = false;
    for ch in text.chars() {
        match ch {
            '"' if !in_symbol => in_string = !in_string,
            '|' if !in_string => in_symbol = !in_symbol,
            '(' if !in_string && !in_symbol => {
                depth += 1;
                seen_token = true;
            }
            ')' if !in_string && !in_symbol => depth -= 1,
            c if !c.is_whitespace() => seen_token = true,
            _ => {}
        }
    }
    seen_token && depth <= 0 && !in_string && !in_symbol
}

struct Reader {
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c == ';' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn expr(&mut self) -> Result<SExpr, SExprError> {
        self.skip_ws();
        match self.peek() {
            None => Err(SExprError::UnexpectedEof),
            Some('(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    match self.peek() {
                        None => return Err(SExprError::UnexpectedEof),
                        Some(')') => {
                            self.pos += 1;
                            return Ok(SExpr::List(items));
                        }
                        Some(_) => items.push(self.expr()?),
                    }
                }
            }
            Some(')') => Err(SExprError::UnexpectedClose(self.chars[self.pos].0)),
            Some('"') => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.peek() {
                        None => return Err(SExprError::UnexpectedEof),
                        Some('"') => {
                            self.pos += 1;
                            // `""` is an escaped quote inside SMT-LIB strings.
                            if self.peek() == Some('"') {
                                out.push('"');
                                self.pos += 1;
                            } else {
                                return Ok(SExpr::Str(out));
                            }
                        }
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                    }
                }
            }
            Some('|') => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.peek() {
                        None => return Err(SExprError::UnexpectedEof),
                        Some('|') => {
                            self.pos += 1;
                            return Ok(SExpr::Atom(out));
                        }
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                    }
                }
            }
            Some(_) => {
                let mut out = String::new();
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '|' | ';') {
                        break;
                    }
                    out.push(c);
                    self.pos += 1;
                }
                Ok(SExpr::Atom(out))
            }
        }
    }
}

/// Interpret a value expression returned by `get-value`.
///
/// Unknown shapes are kept verbatim as [`ModelValue::Other`].
pub fn to_model_value(expr: &SExpr, sort: &SmtSort) -> ModelValue {
    match sort {
        SmtSort::Bool => match expr.as_atom() {
            Some("true") => ModelValue::Bool(true),
            Some("false") => ModelValue::Bool(false),
            _ => ModelValue::Other(expr.to_string()),
        },
        SmtSort::Int => match numeric(expr) {
            Some(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => ModelValue::Int(v as i64),
            _ => match int_atom(expr) {
                Some(n) => ModelValue::Int(n),
                None => ModelValue::Other(expr.to_string()),
            },
        },
        SmtSort::Real => match numeric(expr) {
            Some(v) => ModelValue::Real(v),
            None => ModelValue::Other(expr.to_string()),
        },
        SmtSort::Uninterpreted(_) => ModelValue::Other(expr.to_string()),
    }
}

fn int_atom(expr: &SExpr) -> Option<i64> {
    match expr {
        SExpr::Atom(a) => a.parse().ok(),
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Atom(op), inner] if op == "-" => int_atom(inner).and_then(i64::checked_neg),
            _ => None,
        },
        SExpr::Str(_) => None,
    }
}

fn numeric(expr: &SExpr) -> Option<f64> {
    match expr {
        SExpr::Atom(a) => a.parse::<f64>().ok().filter(|v| v.is_finite()),
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Atom(op), inner] if op == "-" => numeric(inner).map(|v| -v),
            [SExpr::Atom(op), num, den] if op == "/" => {
                let den = numeric(den)?;
                if den == 0.0 {
                    None
                } else {
                    Some(numeric(num)? / den)
                }
            }
            // cvc5 may wrap values as `(to_real n)` or `(as n Real)`.
            [SExpr::Atom(op), inner] if op == "to_real" => numeric(inner),
            [SExpr::Atom(op), inner, _] if op == "as" => numeric(inner),
            _ => None,
        },
        SExpr::Str(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_lists_and_quoted_forms() {
        let expr = parse(r#"((x (- 7)) (|a b| "say ""hi"""))"#).expect("parse");
        let items = expr.as_list().expect("list");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_list().expect("pair")[0], SExpr::Atom("a b".into()));
        assert_eq!(
            items[1].as_list().expect("pair")[1],
            SExpr::Str(r#"say "hi""#.into())
        );
    }

    #[test]
    fn rejects_unbalanced_input() {
        assert_eq!(parse("(a b"), Err(SExprError::UnexpectedEof));
        assert!(matches!(parse(") a"), Err(SExprError::UnexpectedClose(0))));
        assert!(matches!(parse("a b"), Err(SExprError::Trailing(2))));
    }

    #[test]
    fn completeness_tracks_depth_and_quotes() {
        assert!(is_complete("sat"));
        assert!(is_complete("((x 1))\n"));
        assert!(!is_complete("((x"));
        assert!(!is_complete("(error \"unbalanced ( in message"));
        assert!(is_complete("(error \"unbalanced ( in message\")"));
        assert!(!is_complete("   \n"));
    }

    #[test]
    fn converts_values_by_sort() {
        let neg = parse("(- 7)").expect("parse");
        assert_eq!(to_model_value(&neg, &SmtSort::Int), ModelValue::Int(-7));

        let frac = parse("(/ 1 4)").expect("parse");
        assert_eq!(to_model_value(&frac, &SmtSort::Real), ModelValue::Real(0.25));

        let neg_frac = parse("(- (/ 3 2))").expect("parse");
        assert_eq!(to_model_value(&neg_frac, &SmtSort::Real), ModelValue::Real(-1.5));

        let whole = parse("2.0").expect("parse");
        assert_eq!(to_model_value(&whole, &SmtSort::Real), ModelValue::Real(2.0));

        let b = parse("false").expect("parse");
        assert_eq!(to_model_value(&b, &SmtSort::Bool), ModelValue::Bool(false));

        let opaque = parse("(as @uc_Email_0 Email)").expect("parse");
        assert_eq!(
            to_model_value(&opaque, &SmtSort::Uninterpreted("Email".into())),
            ModelValue::Other("(as @uc_Email_0 Email)".into())
        );
    }

    #[test]
    fn huge_integers_fall_back_to_exact_parsing_or_other() {
        let big = parse("9223372036854775807").expect("parse");
        assert_eq!(to_model_value(&big, &SmtSort::Int), ModelValue::Int(i64::MAX));
        let too_big = parse("99999999999999999999999").expect("parse");
        assert_eq!(
            to_model_value(&too_big, &SmtSort::Int),
            ModelValue::Other("99999999999999999999999".into())
        );
    }
}
