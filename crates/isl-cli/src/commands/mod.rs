pub(crate) mod check;
pub(crate) mod generate;

use std::path::Path;

use isl_verify::generator::{GenerationOptions, GeneratedScript};
use miette::IntoDiagnostic;

use crate::bundle::SpecBundle;

pub(crate) fn load_scripts(
    file: &Path,
    options: &GenerationOptions,
) -> miette::Result<(SpecBundle, Vec<GeneratedScript>)> {
    let bundle = SpecBundle::load(file).into_diagnostic()?;
    let scripts = bundle.scripts(options);
    for script in &scripts {
        for failure in &script.errors {
            tracing::warn!("{}: skipped {failure}", script.check);
        }
    }
    Ok((bundle, scripts))
}

pub(crate) fn generation_options(logic: String, timeout_ms: u64) -> GenerationOptions {
    GenerationOptions {
        logic,
        timeout_ms,
        ..GenerationOptions::default()
    }
}
