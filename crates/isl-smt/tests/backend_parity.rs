//! Backend parity tests: the subprocess backends and the in-process Z3
//! backend must agree on SAT/UNSAT verdicts and unsat cores for small
//! formulas.
//!
//! Tests that need a solver binary are gated behind `#[ignore]`. Run with
//! `cargo test -- --ignored` to include them.

use isl_smt::backends::process::{SmtLibProcess, SolverBinary};
use isl_smt::session::SolverSession;
use isl_smt::solver::{
    CheckOptions, SatResult, SatisfiabilityChecker, SmtSolver, SolverOutcome, TaggedAssertion,
};
use isl_smt::sorts::{Declaration, SmtSort};
use isl_smt::terms::SmtTerm;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn process(binary: SolverBinary) -> Result<SmtLibProcess, Box<dyn std::error::Error>> {
    Ok(SmtLibProcess::new(binary)?)
}

fn contradictory_bounds() -> Vec<TaggedAssertion> {
    vec![
        TaggedAssertion::new("pre_Order_0", SmtTerm::var("x").gt(SmtTerm::int(5))),
        TaggedAssertion::new("pre_Order_1", SmtTerm::var("x").lt(SmtTerm::int(3))),
        TaggedAssertion::new("pre_Order_2", SmtTerm::var("y").ge(SmtTerm::int(0))),
    ]
}

fn decls() -> Vec<Declaration> {
    vec![Declaration::int("x"), Declaration::int("y")]
}

#[test]
#[ignore = "requires cvc5 binary"]
fn cvc5_simple_sat_and_unsat() -> TestResult {
    let mut solver = process(SolverBinary::Cvc5)?;
    solver.declare_var("x", &SmtSort::Int)?;
    solver.assert(&SmtTerm::and(vec![
        SmtTerm::var("x").gt(SmtTerm::int(0)),
        SmtTerm::var("x").lt(SmtTerm::int(10)),
    ]))?;
    assert_eq!(solver.check_sat()?, SatResult::Sat);

    solver.reset()?;
    solver.declare_var("x", &SmtSort::Int)?;
    solver.assert(&SmtTerm::and(vec![
        SmtTerm::var("x").gt(SmtTerm::int(0)),
        SmtTerm::var("x").lt(SmtTerm::int(0)),
    ]))?;
    assert_eq!(solver.check_sat()?, SatResult::Unsat);
    Ok(())
}

#[test]
#[ignore = "requires cvc5 binary"]
fn cvc5_model_reads_negative_and_real_values() -> TestResult {
    let mut solver = process(SolverBinary::Cvc5)?;
    solver.declare_var("x", &SmtSort::Int)?;
    solver.declare_var("rate", &SmtSort::Real)?;
    solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(-7)))?;
    solver.assert(&SmtTerm::var("rate").eq(SmtTerm::real(0.25)))?;

    let (result, model) =
        solver.check_sat_with_model(&[("x", &SmtSort::Int), ("rate", &SmtSort::Real)])?;
    assert_eq!(result, SatResult::Sat);
    let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
    assert_eq!(model.get_int("x"), Some(-7));
    assert_eq!(model.get_real("rate"), Some(0.25));
    Ok(())
}

#[test]
#[ignore = "requires cvc5 binary"]
fn cvc5_session_reports_core_as_tags() -> TestResult {
    let mut session = SolverSession::new(process(SolverBinary::Cvc5)?);
    let outcome = session.check_tagged(&contradictory_bounds(), &decls(), &CheckOptions::default());
    let SolverOutcome::Unsat { core: Some(core) } = outcome else {
        return Err(format!("expected unsat with core, got {outcome:?}").into());
    };
    assert_eq!(core, vec!["pre_Order_0", "pre_Order_1"]);
    Ok(())
}

#[test]
#[ignore = "requires cvc5 binary"]
fn cvc5_session_recovers_after_solver_error() -> TestResult {
    let mut session = SolverSession::new(process(SolverBinary::Cvc5)?);
    // `y` is never declared, so the backend rejects the assertion.
    let bad = session.check_satisfiability(
        &SmtTerm::var("y").gt(SmtTerm::int(0)),
        &[Declaration::int("x")],
        &CheckOptions::default(),
    );
    assert!(matches!(bad, SolverOutcome::Error { .. }), "{bad:?}");

    let good = session.check_satisfiability(
        &SmtTerm::var("x").gt(SmtTerm::int(0)),
        &[Declaration::int("x")],
        &CheckOptions::default(),
    );
    assert!(good.is_sat(), "{good:?}");
    Ok(())
}

#[test]
#[ignore = "requires z3 binary"]
fn z3_process_session_reports_core_as_tags() -> TestResult {
    let mut session = SolverSession::new(process(SolverBinary::Z3)?);
    let outcome = session.check_tagged(&contradictory_bounds(), &decls(), &CheckOptions::default());
    let SolverOutcome::Unsat { core: Some(core) } = outcome else {
        return Err(format!("expected unsat with core, got {outcome:?}").into());
    };
    assert!(core.contains(&"pre_Order_0".to_string()));
    assert!(core.contains(&"pre_Order_1".to_string()));
    assert!(!core.contains(&"pre_Order_2".to_string()));
    Ok(())
}

#[test]
#[ignore = "requires cvc5 and z3 binaries"]
fn cvc5_z3_parity_on_uninterpreted_equality() -> TestResult {
    let formula = SmtTerm::and(vec![
        SmtTerm::var("a").eq(SmtTerm::var("b")),
        SmtTerm::var("a").eq(SmtTerm::var("b")).not(),
    ]);
    let decls = vec![
        Declaration::new("a", SmtSort::Uninterpreted("UUID".into())),
        Declaration::new("b", SmtSort::Uninterpreted("UUID".into())),
    ];

    let mut cvc5 = SolverSession::new(process(SolverBinary::Cvc5)?);
    let mut z3 = SolverSession::new(process(SolverBinary::Z3)?);
    let options = CheckOptions::default();
    let from_cvc5 = cvc5.check_satisfiability(&formula, &decls, &options);
    let from_z3 = z3.check_satisfiability(&formula, &decls, &options);

    assert!(from_cvc5.is_unsat(), "{from_cvc5:?}");
    assert_eq!(from_cvc5.status_name(), from_z3.status_name());
    Ok(())
}

#[cfg(feature = "z3")]
mod in_process {
    use super::*;
    use isl_smt::backends::z3_backend::Z3Solver;

    #[test]
    fn z3_session_reports_core_as_tags() -> TestResult {
        let mut session = SolverSession::new(Z3Solver::new());
        let outcome =
            session.check_tagged(&contradictory_bounds(), &decls(), &CheckOptions::default());
        let SolverOutcome::Unsat { core: Some(core) } = outcome else {
            return Err(format!("expected unsat with core, got {outcome:?}").into());
        };
        assert!(core.contains(&"pre_Order_0".to_string()));
        assert!(core.contains(&"pre_Order_1".to_string()));
        Ok(())
    }

    #[test]
    fn z3_session_returns_model_for_sat() -> TestResult {
        let mut session = SolverSession::new(Z3Solver::new());
        let outcome = session.check_satisfiability(
            &SmtTerm::var("x").eq(SmtTerm::int(42)),
            &[Declaration::int("x")],
            &CheckOptions::default(),
        );
        let SolverOutcome::Sat { model: Some(model) } = outcome else {
            return Err(format!("expected sat with model, got {outcome:?}").into());
        };
        assert_eq!(model.get_int("x"), Some(42));
        Ok(())
    }

    #[test]
    #[ignore = "requires cvc5 binary"]
    fn cvc5_z3_parity_unsat() -> TestResult {
        let formula = SmtTerm::and(vec![
            SmtTerm::var("x").gt(SmtTerm::int(5)),
            SmtTerm::var("x").lt(SmtTerm::int(3)),
        ]);
        let decls = [Declaration::int("x")];
        let options = CheckOptions::default();

        let z3_result =
            SolverSession::new(Z3Solver::new()).check_satisfiability(&formula, &decls, &options);
        let cvc5_result = SolverSession::new(process(SolverBinary::Cvc5)?)
            .check_satisfiability(&formula, &decls, &options);

        assert_eq!(z3_result, cvc5_result, "Z3 and cvc5 should agree on UNSAT");
        Ok(())
    }
}
