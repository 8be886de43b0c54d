#![doc = include_str!("../README.md")]
//! SMT encoding and diagnostics for ISL verification conditions.
//!
//! Conditions are encoded into [`isl_smt::terms::SmtTerm`]s, assembled into
//! tagged SMT-LIB scripts with a [`source_map::SourceMap`] back to the
//! specification, and solver outcomes are turned into
//! [`report::DiagnosticReport`]s: minimized counterexamples for sat, unsat
//! cores for unsat, classified reasons for everything else.

pub mod check;
pub mod classify;
pub mod encoder;
pub mod error;
pub mod evaluator;
pub mod generator;
pub mod minimizer;
pub mod report;
pub mod source_map;
pub mod unsat_core;
