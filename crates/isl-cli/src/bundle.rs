//! JSON specification bundles and the checks they expand to.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use isl_verify::encoder::{create_context, Condition, EncodingContext, TypeConstraint, VALUE_IDENT};
use isl_verify::generator::{
    generate_invariant_check, generate_postcondition_check, generate_precondition_check,
    generate_refinement_check, sanitize_symbol, GeneratedScript, GenerationOptions,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum BundleError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid bundle {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("duplicate {what} name `{name}`")]
    Duplicate { what: &'static str, name: String },
    #[error("{what} names `{first}` and `{second}` map to the same symbol")]
    Collision {
        what: &'static str,
        first: String,
        second: String,
    },
    #[error("{what} name must not be empty")]
    EmptyName { what: &'static str },
}

/// A domain: shared variables, behaviors, invariants and refinement types.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SpecBundle {
    pub domain: String,
    /// Variable name to ISL type name, visible to every behavior.
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    #[serde(default)]
    pub behaviors: Vec<BehaviorSpec>,
    #[serde(default)]
    pub invariants: Vec<Condition>,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BehaviorSpec {
    pub name: String,
    /// Inputs and locals, added to the domain variables.
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    #[serde(default)]
    pub preconditions: Vec<Condition>,
    #[serde(default)]
    pub postconditions: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TypeSpec {
    pub name: String,
    pub base: String,
    #[serde(default)]
    pub constraints: Vec<TypeConstraint>,
}

/// Names become tag and file-name components, so two names that sanitize to
/// the same symbol are rejected like exact duplicates.
fn unique_names<'a>(
    what: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), BundleError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(BundleError::EmptyName { what });
        }
        if let Some(previous) = seen.insert(sanitize_symbol(name), name) {
            return Err(if previous == name {
                BundleError::Duplicate {
                    what,
                    name: name.to_string(),
                }
            } else {
                BundleError::Collision {
                    what,
                    first: previous.to_string(),
                    second: name.to_string(),
                }
            });
        }
    }
    Ok(())
}

impl SpecBundle {
    pub(crate) fn load(path: &Path) -> Result<Self, BundleError> {
        let text = fs::read_to_string(path).map_err(|source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle: SpecBundle =
            serde_json::from_str(&text).map_err(|source| BundleError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        bundle.validate()?;
        Ok(bundle)
    }

    fn validate(&self) -> Result<(), BundleError> {
        if self.domain.trim().is_empty() {
            return Err(BundleError::EmptyName { what: "domain" });
        }
        unique_names("behavior", self.behaviors.iter().map(|b| b.name.as_str()))?;
        unique_names("type", self.types.iter().map(|t| t.name.as_str()))
    }

    fn context(&self, extra: &IndexMap<String, String>) -> EncodingContext {
        let mut ctx = create_context();
        for (name, ty) in self.variables.iter().chain(extra) {
            ctx.declare_isl(name.clone(), ty);
        }
        ctx
    }

    /// Every script the bundle calls for, in bundle order: per behavior a
    /// precondition and a postcondition check, then the domain invariants,
    /// then one inhabitation check per refinement type.
    pub(crate) fn scripts(&self, options: &GenerationOptions) -> Vec<GeneratedScript> {
        let mut out = Vec::new();
        for behavior in &self.behaviors {
            let ctx = self.context(&behavior.variables);
            if !behavior.preconditions.is_empty() {
                out.push(generate_precondition_check(
                    &behavior.name,
                    &behavior.preconditions,
                    &ctx,
                    options,
                ));
            }
            if !behavior.postconditions.is_empty() {
                out.push(generate_postcondition_check(
                    &behavior.name,
                    &behavior.preconditions,
                    &behavior.postconditions,
                    &ctx,
                    options,
                ));
            }
        }
        if !self.invariants.is_empty() {
            let ctx = self.context(&IndexMap::new());
            out.push(generate_invariant_check(
                &self.domain,
                &self.invariants,
                &ctx,
                options,
            ));
        }
        for ty in &self.types {
            out.push(generate_refinement_check(
                &ty.name,
                VALUE_IDENT,
                &ty.base,
                &ty.constraints,
                options,
            ));
        }
        out
    }
}
