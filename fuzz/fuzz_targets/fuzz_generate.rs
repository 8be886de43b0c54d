#![no_main]
use libfuzzer_sys::fuzz_target;

use isl_verify::encoder::{create_context, Condition};
use isl_verify::generator::{generate_postcondition_check, GenerationOptions};

fuzz_target!(|data: &[u8]| {
    let Ok(conditions) = serde_json::from_slice::<Vec<Condition>>(data) else {
        return;
    };
    let (pre, post) = conditions.split_at(conditions.len() / 2);
    let mut ctx = create_context();
    ctx.declare_isl("x", "Int")
        .declare_isl("y", "Decimal")
        .declare_isl("flag", "Boolean");
    // Generation must never panic; every condition is mapped or reported.
    let script = generate_postcondition_check("Fuzz", pre, post, &ctx, &GenerationOptions::default());
    assert!(script.source_map.len() + script.errors.len() <= conditions.len() + 1);
    for assertion in &script.assertions {
        assert!(script.source_map.get(&assertion.tag).is_some());
    }
});
