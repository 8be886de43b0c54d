use serde::{Deserialize, Serialize};

/// SMT sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmtSort {
    Bool,
    Int,
    Real,
    /// Opaque sort declared with `declare-sort`; values are only comparable for equality.
    Uninterpreted(String),
}

impl SmtSort {
    pub fn is_numeric(&self) -> bool {
        matches!(self, SmtSort::Int | SmtSort::Real)
    }
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Int => write!(f, "Int"),
            SmtSort::Real => write!(f, "Real"),
            SmtSort::Uninterpreted(name) => write!(f, "{name}"),
        }
    }
}

/// A named constant paired with its sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub sort: SmtSort,
}

impl Declaration {
    pub fn new(name: impl Into<String>, sort: SmtSort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, SmtSort::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, SmtSort::Int)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, SmtSort::Real)
    }

    /// `(declare-const name Sort)`.
    pub fn to_smtlib(&self) -> String {
        crate::backends::smtlib_printer::decl_to_smtlib(self)
    }
}
