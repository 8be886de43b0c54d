#![no_main]
use libfuzzer_sys::fuzz_target;

use isl_smt::solver::{Model, ModelValue};
use isl_verify::encoder::{create_context, encode_condition, Condition};
use isl_verify::evaluator::evaluate;

fuzz_target!(|data: &[u8]| {
    let Some((&seed, rest)) = data.split_first() else {
        return;
    };
    let Ok(condition) = serde_json::from_slice::<Condition>(rest) else {
        return;
    };
    let mut ctx = create_context();
    ctx.declare_isl("x", "Int")
        .declare_isl("y", "Decimal")
        .declare_isl("flag", "Boolean");
    let Ok(term) = encode_condition(&condition, &ctx) else {
        return;
    };

    // Low seed bits decide which variables the partial model binds.
    let mut model = Model::new();
    if seed & 1 != 0 {
        model.insert("x", ModelValue::Int(i64::from(seed) - 128));
    }
    if seed & 2 != 0 {
        model.insert("y", ModelValue::Real(f64::from(seed) / 7.0));
    }
    if seed & 4 != 0 {
        model.insert("flag", ModelValue::Bool(seed & 8 != 0));
    }

    let truth = evaluate(&term, &model);
    assert_eq!(truth, evaluate(&term, &model));
    assert_eq!(evaluate(&term.clone().not(), &model), truth.negate());
});
