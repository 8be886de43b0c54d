use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::sorts::{Declaration, SmtSort};
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// A model (variable assignments) extracted from a SAT result.
///
/// Iteration follows insertion order, which backends keep equal to the
/// declaration order of the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model {
    pub values: IndexMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Value the core cannot interpret (uninterpreted sort element, string, ...).
    Other(String),
}

impl ModelValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ModelValue::Int(n) => Some(*n as f64),
            ModelValue::Real(r) => Some(*r),
            ModelValue::Bool(_) | ModelValue::Other(_) => None,
        }
    }
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Bool(b) => write!(f, "{b}"),
            ModelValue::Int(n) => write!(f, "{n}"),
            ModelValue::Real(r) => write!(f, "{r}"),
            ModelValue::Other(raw) => write!(f, "{raw}"),
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ModelValue) {
        self.values.insert(name.into(), value);
    }

    /// Remove a variable, keeping the relative order of the others.
    pub fn remove(&mut self, name: &str) -> Option<ModelValue> {
        self.values.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ModelValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_real(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(ModelValue::as_f64)
    }
}

impl<K: Into<String>> FromIterator<(K, ModelValue)> for Model {
    fn from_iter<I: IntoIterator<Item = (K, ModelValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract a model if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    /// Returns true when the backend supports `check-sat-assuming` with
    /// retrievable UNSAT cores over the provided assumptions.
    fn supports_assumption_unsat_core(&self) -> bool {
        false
    }

    /// Check satisfiability under a set of Boolean assumption variables.
    ///
    /// Assumptions are backend variable names that must be declared as `Bool`.
    fn check_sat_assuming(&mut self, _assumptions: &[String]) -> Result<SatResult, Self::Error> {
        self.check_sat()
    }

    /// Return UNSAT-core assumptions for the previous `check_sat_assuming`.
    fn get_unsat_core_assumptions(&mut self) -> Result<Vec<String>, Self::Error> {
        Ok(Vec::new())
    }

    /// Bound the wall-clock time of subsequent checks. `0` disables the limit.
    fn set_timeout_ms(&mut self, _timeout_ms: u64) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Reset the solver state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

/// Per-call options for [`SatisfiabilityChecker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOptions {
    /// Solver timeout in milliseconds; `0` means no limit.
    pub timeout_ms: u64,
    /// Ask the backend for a model on SAT.
    pub produce_models: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            produce_models: true,
        }
    }
}

/// Outcome of one satisfiability query.
///
/// Solver failures are values, not errors: callers must handle the
/// "could not determine" cases explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SolverOutcome {
    Sat {
        model: Option<Model>,
    },
    Unsat {
        /// Tags of the named assertions in the core, when the backend reports one.
        core: Option<Vec<String>>,
    },
    Unknown {
        reason: String,
    },
    Timeout {
        elapsed_ms: u64,
    },
    Error {
        message: String,
    },
}

impl SolverOutcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolverOutcome::Sat { .. })
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SolverOutcome::Unsat { .. })
    }

    /// Neither sat nor unsat.
    pub fn is_inconclusive(&self) -> bool {
        !self.is_sat() && !self.is_unsat()
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            SolverOutcome::Sat { .. } => "sat",
            SolverOutcome::Unsat { .. } => "unsat",
            SolverOutcome::Unknown { .. } => "unknown",
            SolverOutcome::Timeout { .. } => "timeout",
            SolverOutcome::Error { .. } => "error",
        }
    }
}

impl fmt::Display for SolverOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverOutcome::Sat { model: Some(m) } => write!(f, "sat ({} assignments)", m.len()),
            SolverOutcome::Sat { model: None } => write!(f, "sat (no model)"),
            SolverOutcome::Unsat { core: Some(core) } => {
                write!(f, "unsat (core: {})", core.join(", "))
            }
            SolverOutcome::Unsat { core: None } => write!(f, "unsat"),
            SolverOutcome::Unknown { reason } => write!(f, "unknown: {reason}"),
            SolverOutcome::Timeout { elapsed_ms } => write!(f, "timeout after {elapsed_ms}ms"),
            SolverOutcome::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// A top-level assertion carrying the tag it is named with in the script.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedAssertion {
    pub tag: String,
    pub term: SmtTerm,
}

impl TaggedAssertion {
    pub fn new(tag: impl Into<String>, term: SmtTerm) -> Self {
        Self {
            tag: tag.into(),
            term,
        }
    }
}

/// One-shot satisfiability contract consumed by the diagnostics core.
///
/// Every call blocks until the backend answers or its timeout fires. Calls
/// are independent: no declaration or assertion survives into the next one.
pub trait SatisfiabilityChecker {
    fn check_satisfiability(
        &mut self,
        formula: &SmtTerm,
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> SolverOutcome;

    /// Check the conjunction of named assertions. Backends that can track
    /// names report the unsat core as a list of tags.
    fn check_tagged(
        &mut self,
        assertions: &[TaggedAssertion],
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> SolverOutcome {
        let formula = SmtTerm::and(assertions.iter().map(|a| a.term.clone()).collect());
        self.check_satisfiability(&formula, declarations, options)
    }
}
