use serde::Serialize;
use thiserror::Error;

/// Why a specification condition could not be translated into a term.
///
/// Encoding failures are never fatal to a generation pass: the generator
/// records them and leaves the offending condition out of the script.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodeError {
    #[error("unknown identifier `{name}`")]
    UnknownIdentifier { name: String },
    #[error("sort mismatch in `{context}`: expected {expected}, found {found}")]
    SortMismatch {
        context: String,
        expected: String,
        found: String,
    },
    #[error("operator `{op}` has no encoding")]
    UnsupportedOperator { op: String },
    #[error("call to `{callee}` has no encoding")]
    UnsupportedCall { callee: String },
    #[error("string literal \"{value}\" has no encoding")]
    StringLiteral { value: String },
    #[error("real literal {value} is not finite")]
    NonFiniteReal { value: f64 },
    #[error("constraint `{constraint}` applies to strings and has no arithmetic encoding")]
    StringConstraint { constraint: String },
}

impl EncodeError {
    pub(crate) fn mismatch(
        context: impl std::fmt::Display,
        expected: impl Into<String>,
        found: impl std::fmt::Display,
    ) -> Self {
        EncodeError::SortMismatch {
            context: context.to_string(),
            expected: expected.into(),
            found: found.to_string(),
        }
    }
}
