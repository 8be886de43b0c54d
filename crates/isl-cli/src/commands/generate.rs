use std::path::PathBuf;

use super::{generation_options, load_scripts};

pub(crate) fn run_generate_command(
    file: PathBuf,
    logic: String,
    timeout_ms: u64,
) -> miette::Result<()> {
    let options = generation_options(logic, timeout_ms);
    let (bundle, scripts) = load_scripts(&file, &options)?;
    println!("; domain {}: {} check(s)", bundle.domain, scripts.len());
    for script in &scripts {
        println!();
        println!("; {} of {}", script.check, script.owner);
        for failure in &script.errors {
            println!("; skipped: {failure}");
        }
        print!("{}", script.script);
        if !script.script.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
