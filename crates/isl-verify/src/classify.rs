//! Classification of inconclusive solver outcomes.

use std::fmt;

use isl_smt::solver::SolverOutcome;
use serde::{Deserialize, Serialize};

/// Size of a query, attached to [`UnknownReason::TooComplex`] when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub assertions: usize,
    pub variables: usize,
}

/// Why a solve attempt ended without sat or unsat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnknownReason {
    Timeout {
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    ResourceLimit {
        detail: String,
    },
    IncompleteTheory {
        detail: String,
    },
    Cancelled,
    SolverError {
        message: String,
    },
    TooComplex {
        #[serde(skip_serializing_if = "Option::is_none")]
        metrics: Option<ComplexityMetrics>,
    },
    Unclassified {
        raw: String,
    },
}

impl UnknownReason {
    pub fn kind(&self) -> &'static str {
        match self {
            UnknownReason::Timeout { .. } => "timeout",
            UnknownReason::ResourceLimit { .. } => "resource_limit",
            UnknownReason::IncompleteTheory { .. } => "incomplete_theory",
            UnknownReason::Cancelled => "cancelled",
            UnknownReason::SolverError { .. } => "solver_error",
            UnknownReason::TooComplex { .. } => "too_complex",
            UnknownReason::Unclassified { .. } => "unclassified",
        }
    }

    /// Attach query metrics to a `TooComplex` reason that has none.
    pub fn with_metrics(self, metrics: ComplexityMetrics) -> Self {
        match self {
            UnknownReason::TooComplex { metrics: None } => UnknownReason::TooComplex {
                metrics: Some(metrics),
            },
            other => other,
        }
    }
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::Timeout {
                timeout_ms: Some(ms),
            } => write!(f, "timeout after {ms}ms"),
            UnknownReason::Timeout { timeout_ms: None } => write!(f, "timeout"),
            UnknownReason::ResourceLimit { detail } => write!(f, "resource limit: {detail}"),
            UnknownReason::IncompleteTheory { detail } => {
                write!(f, "incomplete theory support: {detail}")
            }
            UnknownReason::Cancelled => write!(f, "cancelled"),
            UnknownReason::SolverError { message } => write!(f, "solver error: {message}"),
            UnknownReason::TooComplex {
                metrics: Some(m),
            } => write!(
                f,
                "query too complex ({} assertions, {} variables)",
                m.assertions, m.variables
            ),
            UnknownReason::TooComplex { metrics: None } => write!(f, "query too complex"),
            UnknownReason::Unclassified { raw } => write!(f, "unclassified: {raw}"),
        }
    }
}

/// Lowercase substrings recognized in solver messages.
pub mod reason_sentinels {
    pub const TIMEOUT: &[&str] = &["timeout", "timed out", "time limit", "deadline"];
    pub const CANCELLED: &[&str] = &["cancel", "abort", "interrupt"];
    pub const RESOURCE: &[&str] = &["resource", "memory", "rlimit", "out of memory", "max. memory"];
    pub const INCOMPLETE: &[&str] = &[
        "incomplete",
        "quantifier",
        "nonlinear",
        "non-linear",
        "unsupported theory",
        "(incomplete",
    ];
    pub const TOO_COMPLEX: &[&str] = &["too complex", "too large", "complexity", "blowup"];
}

fn mentions(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

/// First `<digits>ms` or `<digits> ms` in `text`.
fn parse_millis(text: &str) -> Option<u64> {
    let bytes = text.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        match (b.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if text[i..].trim_start().starts_with("ms") {
                    return text[s..i].parse().ok();
                }
                start = None;
            }
            _ => {}
        }
    }
    None
}

/// Map an inconclusive outcome to exactly one [`UnknownReason`].
///
/// Returns `None` for sat and unsat. Messages that match no sentinel are
/// kept verbatim as [`UnknownReason::Unclassified`].
pub fn classify_unknown(outcome: &SolverOutcome) -> Option<UnknownReason> {
    use reason_sentinels::*;
    match outcome {
        SolverOutcome::Sat { .. } | SolverOutcome::Unsat { .. } => None,
        SolverOutcome::Timeout { elapsed_ms } => Some(UnknownReason::Timeout {
            timeout_ms: Some(*elapsed_ms),
        }),
        SolverOutcome::Error { message } => {
            let lower = message.to_lowercase();
            let reason = if mentions(&lower, CANCELLED) {
                UnknownReason::Cancelled
            } else if mentions(&lower, RESOURCE) {
                UnknownReason::ResourceLimit {
                    detail: message.clone(),
                }
            } else {
                UnknownReason::SolverError {
                    message: message.clone(),
                }
            };
            Some(reason)
        }
        SolverOutcome::Unknown { reason } => {
            let lower = reason.to_lowercase();
            let classified = if mentions(&lower, TIMEOUT) {
                UnknownReason::Timeout {
                    timeout_ms: parse_millis(&lower),
                }
            } else if mentions(&lower, RESOURCE) {
                UnknownReason::ResourceLimit {
                    detail: reason.clone(),
                }
            } else if mentions(&lower, TOO_COMPLEX) {
                UnknownReason::TooComplex { metrics: None }
            } else if mentions(&lower, INCOMPLETE) {
                UnknownReason::IncompleteTheory {
                    detail: reason.clone(),
                }
            } else if mentions(&lower, CANCELLED) {
                UnknownReason::Cancelled
            } else {
                UnknownReason::Unclassified {
                    raw: reason.clone(),
                }
            };
            Some(classified)
        }
    }
}
