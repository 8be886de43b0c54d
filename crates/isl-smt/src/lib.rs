#![doc = include_str!("../README.md")]

//! Solver-facing half of the ISL verification pipeline.
//!
//! This crate owns the term language shared by the encoder and the
//! diagnostics passes, the SMT-LIB2 printer, and the solver backends. The
//! diagnostics layer only sees the one-shot [`solver::SatisfiabilityChecker`]
//! contract; [`session::SolverSession`] adapts any incremental
//! [`solver::SmtSolver`] to it.

pub mod backends;
pub mod session;
pub mod solver;
pub mod sorts;
pub mod terms;
