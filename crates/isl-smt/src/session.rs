//! Adapter from the incremental [`SmtSolver`] interface to the one-shot
//! [`SatisfiabilityChecker`] contract.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::solver::{
    CheckOptions, Model, SatResult, SatisfiabilityChecker, SmtSolver, SolverOutcome,
    TaggedAssertion,
};
use crate::sorts::{Declaration, SmtSort};
use crate::terms::SmtTerm;

const TRACK_PREFIX: &str = "__isl_track_";

/// Aggregated solver usage for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionProfile {
    pub solve_calls: u64,
    pub solve_elapsed_ms: u128,
    pub backend_errors: u64,
}

/// Runs each query on a freshly reset incremental solver.
pub struct SolverSession<S: SmtSolver> {
    solver: S,
    profile: SessionProfile,
}

impl<S: SmtSolver> SolverSession<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            profile: SessionProfile::default(),
        }
    }

    pub fn profile(&self) -> &SessionProfile {
        &self.profile
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    pub fn into_inner(self) -> S {
        self.solver
    }

    fn prepare(
        &mut self,
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> Result<(), S::Error> {
        self.solver.reset()?;
        self.solver.set_timeout_ms(options.timeout_ms)?;
        for decl in declarations {
            self.solver.declare_var(&decl.name, &decl.sort)?;
        }
        Ok(())
    }

    fn run_plain(
        &mut self,
        formula: &SmtTerm,
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> Result<(SatResult, Option<Model>), S::Error> {
        self.prepare(declarations, options)?;
        self.solver.assert(formula)?;
        if options.produce_models {
            let vars = model_vars(declarations);
            self.solver.check_sat_with_model(&vars)
        } else {
            Ok((self.solver.check_sat()?, None))
        }
    }

    fn run_tagged(
        &mut self,
        assertions: &[TaggedAssertion],
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> Result<TaggedRun, S::Error> {
        self.prepare(declarations, options)?;

        if !self.solver.supports_assumption_unsat_core() {
            for assertion in assertions {
                self.solver.assert(&assertion.term)?;
            }
            let (result, model) = if options.produce_models {
                self.solver.check_sat_with_model(&model_vars(declarations))?
            } else {
                (self.solver.check_sat()?, None)
            };
            return Ok(TaggedRun {
                result,
                model,
                core: None,
            });
        }

        let prefix = track_prefix(declarations);
        let mut tag_by_track: HashMap<String, String> = HashMap::with_capacity(assertions.len());
        let mut tracks = Vec::with_capacity(assertions.len());
        for (idx, assertion) in assertions.iter().enumerate() {
            let track = format!("{prefix}{idx}");
            self.solver.declare_var(&track, &SmtSort::Bool)?;
            self.solver
                .assert(&SmtTerm::var(track.clone()).implies(assertion.term.clone()))?;
            tag_by_track.insert(track.clone(), assertion.tag.clone());
            tracks.push(track);
        }

        match self.solver.check_sat_assuming(&tracks)? {
            SatResult::Unsat => {
                let mut core: Vec<String> = self
                    .solver
                    .get_unsat_core_assumptions()?
                    .into_iter()
                    .filter_map(|name| tag_by_track.get(&name).cloned())
                    .collect();
                // Report tags in assertion order.
                core.sort_by_key(|tag| assertions.iter().position(|a| &a.tag == tag));
                core.dedup();
                Ok(TaggedRun {
                    result: SatResult::Unsat,
                    model: None,
                    core: Some(core),
                })
            }
            SatResult::Sat if options.produce_models => {
                self.solver.push()?;
                for track in &tracks {
                    self.solver.assert(&SmtTerm::var(track.clone()))?;
                }
                let (result, model) = self
                    .solver
                    .check_sat_with_model(&model_vars(declarations))?;
                self.solver.pop()?;
                Ok(TaggedRun {
                    result,
                    model,
                    core: None,
                })
            }
            other => Ok(TaggedRun {
                result: other,
                model: None,
                core: None,
            }),
        }
    }

    fn finish(
        &mut self,
        run: Result<TaggedRun, S::Error>,
        started: Instant,
        options: &CheckOptions,
    ) -> SolverOutcome {
        let elapsed_ms = started.elapsed().as_millis();
        self.profile.solve_calls = self.profile.solve_calls.saturating_add(1);
        self.profile.solve_elapsed_ms = self.profile.solve_elapsed_ms.saturating_add(elapsed_ms);
        let elapsed_ms = u64::try_from(elapsed_ms).unwrap_or(u64::MAX);

        match run {
            Ok(TaggedRun {
                result: SatResult::Sat,
                model,
                ..
            }) => SolverOutcome::Sat { model },
            Ok(TaggedRun {
                result: SatResult::Unsat,
                core,
                ..
            }) => SolverOutcome::Unsat { core },
            Ok(TaggedRun {
                result: SatResult::Unknown(reason),
                ..
            }) => {
                if options.timeout_ms > 0 && elapsed_ms >= options.timeout_ms {
                    debug!(elapsed_ms, %reason, "solver unknown after full timeout");
                    SolverOutcome::Timeout { elapsed_ms }
                } else {
                    SolverOutcome::Unknown { reason }
                }
            }
            Err(err) => {
                self.profile.backend_errors = self.profile.backend_errors.saturating_add(1);
                let message = err.to_string();
                warn!(%message, "solver backend error");
                // Leave the backend usable for the next query.
                let _ = self.solver.reset();
                SolverOutcome::Error { message }
            }
        }
    }
}

struct TaggedRun {
    result: SatResult,
    model: Option<Model>,
    core: Option<Vec<String>>,
}

/// A tracking-literal prefix that no declared name starts with.
fn track_prefix(declarations: &[Declaration]) -> String {
    let mut prefix = TRACK_PREFIX.to_string();
    while declarations.iter().any(|d| d.name.starts_with(&prefix)) {
        prefix.push('_');
    }
    prefix
}

fn model_vars(declarations: &[Declaration]) -> Vec<(&str, &SmtSort)> {
    declarations
        .iter()
        .map(|d| (d.name.as_str(), &d.sort))
        .collect()
}

impl<S: SmtSolver> SatisfiabilityChecker for SolverSession<S> {
    fn check_satisfiability(
        &mut self,
        formula: &SmtTerm,
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> SolverOutcome {
        let started = Instant::now();
        let run = self
            .run_plain(formula, declarations, options)
            .map(|(result, model)| TaggedRun {
                result,
                model,
                core: None,
            });
        self.finish(run, started, options)
    }

    fn check_tagged(
        &mut self,
        assertions: &[TaggedAssertion],
        declarations: &[Declaration],
        options: &CheckOptions,
    ) -> SolverOutcome {
        let started = Instant::now();
        let run = self.run_tagged(assertions, declarations, options);
        self.finish(run, started, options)
    }
}
