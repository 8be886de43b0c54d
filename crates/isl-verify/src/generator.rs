//! SMT-LIB script generation with tagged assertions and a source map.
//!
//! Every top-level assertion is emitted as `(assert (! <expr> :named <tag>))`
//! with `tag = {prefix}_{owner}_{index}`. Conditions that fail to encode are
//! reported in [`GeneratedScript::errors`] and left out of the script.

use std::fmt::Write as _;

use isl_smt::backends::smtlib_printer::{decl_to_smtlib, sort_declarations, to_smtlib};
use isl_smt::solver::TaggedAssertion;
use isl_smt::sorts::Declaration;
use isl_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::encoder::{
    encode_condition, encode_type_constraint, Condition, EncodingContext, SourceLocation,
    TypeConstraint,
};
use crate::error::EncodeError;
use crate::source_map::{AssertionKind, SourceMap, SourceMappedAssertion};

pub const PRE_PREFIX: &str = "pre";
pub const POST_PREFIX: &str = "post";
pub const INV_PREFIX: &str = "inv";
pub const REF_PREFIX: &str = "ref";
pub const NEG_POST_PREFIX: &str = "neg_post";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub logic: String,
    /// Emitted as `(set-option :timeout N)`; `0` omits it.
    pub timeout_ms: u64,
    pub produce_models: bool,
    pub produce_unsat_cores: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            logic: "ALL".to_string(),
            timeout_ms: 5_000,
            produce_models: true,
            produce_unsat_cores: true,
        }
    }
}

/// Which question a script asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Are the preconditions satisfiable together?
    Precondition,
    /// Do the preconditions imply the postconditions?
    Postcondition,
    /// Are the invariants satisfiable together?
    Invariant,
    /// Is the refinement type inhabited?
    Refinement,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckKind::Precondition => "precondition consistency",
            CheckKind::Postcondition => "postcondition validity",
            CheckKind::Invariant => "invariant consistency",
            CheckKind::Refinement => "refinement inhabitation",
        };
        f.write_str(name)
    }
}

/// A condition that was left out of the script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodingFailure {
    pub kind: AssertionKind,
    pub owner: String,
    pub index: usize,
    pub source_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub error: EncodeError,
}

impl std::fmt::Display for EncodingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{} of {}", self.kind, self.index, self.owner)?;
        if let Some(loc) = self.location {
            write!(f, " ({loc})")?;
        }
        write!(f, " `{}`: {}", self.source_text, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedScript {
    pub check: CheckKind,
    pub owner: String,
    pub script: String,
    pub source_map: SourceMap,
    pub errors: Vec<EncodingFailure>,
    pub declarations: Vec<Declaration>,
    #[serde(skip)]
    pub assertions: Vec<TaggedAssertion>,
}

impl GeneratedScript {
    /// Conjunction of every asserted term.
    pub fn formula(&self) -> SmtTerm {
        SmtTerm::and(self.assertions.iter().map(|a| a.term.clone()).collect())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Replace everything outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_symbol(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub fn make_tag(prefix: &str, owner: &str, index: usize) -> String {
    format!("{prefix}_{}_{index}", sanitize_symbol(owner))
}

/// Accumulates one script's assertions, source map and errors.
struct ScriptBuilder<'a> {
    check: CheckKind,
    owner: &'a str,
    ctx: &'a EncodingContext,
    source_map: SourceMap,
    errors: Vec<EncodingFailure>,
    assertions: Vec<TaggedAssertion>,
}

impl<'a> ScriptBuilder<'a> {
    fn new(check: CheckKind, owner: &'a str, ctx: &'a EncodingContext) -> Self {
        Self {
            check,
            owner,
            ctx,
            source_map: SourceMap::new(),
            errors: Vec::new(),
            assertions: Vec::new(),
        }
    }

    /// Encode every condition; successes get a tag and a source-map entry.
    fn encode_all(
        &mut self,
        prefix: &str,
        kind: AssertionKind,
        conditions: &[Condition],
    ) -> Vec<(String, SmtTerm)> {
        conditions
            .iter()
            .enumerate()
            .filter_map(|(index, condition)| {
                let encoded = encode_condition(condition, self.ctx);
                self.record(
                    prefix,
                    kind,
                    index,
                    condition.source_text(),
                    condition.location,
                    encoded,
                )
            })
            .collect()
    }

    fn record(
        &mut self,
        prefix: &str,
        kind: AssertionKind,
        index: usize,
        source_text: String,
        location: Option<SourceLocation>,
        encoded: Result<SmtTerm, EncodeError>,
    ) -> Option<(String, SmtTerm)> {
        match encoded {
            Ok(term) => {
                let tag = make_tag(prefix, self.owner, index);
                let entry = SourceMappedAssertion {
                    tag: tag.clone(),
                    kind,
                    owner: self.owner.to_string(),
                    index,
                    source_text: Some(source_text),
                    location,
                    smt_text: to_smtlib(&term),
                    expr: Some(term.clone()),
                };
                if !self.source_map.insert(entry) {
                    warn!(%tag, "duplicate assertion tag; keeping the first");
                    return None;
                }
                Some((tag, term))
            }
            Err(error) => {
                warn!(
                    owner = self.owner,
                    %kind,
                    index,
                    %error,
                    "skipping condition that failed to encode"
                );
                self.errors.push(EncodingFailure {
                    kind,
                    owner: self.owner.to_string(),
                    index,
                    source_text,
                    location,
                    error,
                });
                None
            }
        }
    }

    fn assert(&mut self, tag: String, term: SmtTerm) {
        self.assertions.push(TaggedAssertion::new(tag, term));
    }

    fn finish(self, declarations: Vec<Declaration>, options: &GenerationOptions) -> GeneratedScript {
        let script = render_script(
            &format!("{} check for {}", self.check, self.owner),
            &declarations,
            &self.assertions,
            options,
        );
        debug!(
            owner = self.owner,
            check = %self.check,
            assertions = self.assertions.len(),
            errors = self.errors.len(),
            "generated script"
        );
        GeneratedScript {
            check: self.check,
            owner: self.owner.to_string(),
            script,
            source_map: self.source_map,
            errors: self.errors,
            declarations,
            assertions: self.assertions,
        }
    }
}

fn render_script(
    header: &str,
    declarations: &[Declaration],
    assertions: &[TaggedAssertion],
    options: &GenerationOptions,
) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let header: String = header
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let _ = writeln!(out, "; {header}");
    if options.produce_models {
        out.push_str("(set-option :produce-models true)\n");
    }
    if options.produce_unsat_cores {
        out.push_str("(set-option :produce-unsat-cores true)\n");
    }
    let _ = writeln!(out, "(set-logic {})", options.logic);
    if options.timeout_ms > 0 {
        let _ = writeln!(out, "(set-option :timeout {})", options.timeout_ms);
    }
    for line in sort_declarations(declarations) {
        let _ = writeln!(out, "{line}");
    }
    for decl in declarations {
        let _ = writeln!(out, "{}", decl_to_smtlib(decl));
    }
    for assertion in assertions {
        let _ = writeln!(
            out,
            "(assert (! {} :named {}))",
            to_smtlib(&assertion.term),
            assertion.tag
        );
    }
    out.push_str("(check-sat)\n");
    if options.produce_models {
        out.push_str("(get-model)\n");
    }
    if options.produce_unsat_cores {
        out.push_str("(get-unsat-core)\n");
    }
    out
}

/// Are `preconditions` satisfiable together? Each is asserted as `pre_*`.
pub fn generate_precondition_check(
    owner: &str,
    preconditions: &[Condition],
    ctx: &EncodingContext,
    options: &GenerationOptions,
) -> GeneratedScript {
    let mut builder = ScriptBuilder::new(CheckKind::Precondition, owner, ctx);
    for (tag, term) in builder.encode_all(PRE_PREFIX, AssertionKind::Precondition, preconditions) {
        builder.assert(tag, term);
    }
    builder.finish(ctx.declarations(), options)
}

/// Do `preconditions` imply `postconditions`?
///
/// Asserts each precondition (`pre_*`) and the negated conjunction of the
/// postconditions (`neg_post_{owner}_0`); the implication is valid iff the
/// script is unsat. Individual postconditions get `post_*` source-map
/// entries so counterexamples can blame a specific clause.
pub fn generate_postcondition_check(
    owner: &str,
    preconditions: &[Condition],
    postconditions: &[Condition],
    ctx: &EncodingContext,
    options: &GenerationOptions,
) -> GeneratedScript {
    let mut builder = ScriptBuilder::new(CheckKind::Postcondition, owner, ctx);
    for (tag, term) in builder.encode_all(PRE_PREFIX, AssertionKind::Precondition, preconditions) {
        builder.assert(tag, term);
    }

    let posts = builder.encode_all(POST_PREFIX, AssertionKind::Postcondition, postconditions);
    if !posts.is_empty() {
        let source_text = format!(
            "not ({})",
            posts
                .iter()
                .filter_map(|(tag, _)| builder.source_map.get(tag))
                .filter_map(|entry| entry.source_text.clone())
                .collect::<Vec<_>>()
                .join(" and ")
        );
        let location = posts
            .first()
            .and_then(|(tag, _)| builder.source_map.get(tag))
            .and_then(|entry| entry.location);
        let mut goals: Vec<SmtTerm> = posts.into_iter().map(|(_, term)| term).collect();
        let goal = if goals.len() == 1 {
            goals.remove(0)
        } else {
            SmtTerm::and(goals)
        };
        if let Some((tag, term)) = builder.record(
            NEG_POST_PREFIX,
            AssertionKind::Postcondition,
            0,
            source_text,
            location,
            Ok(goal.not()),
        ) {
            builder.assert(tag, term);
        }
    }
    builder.finish(ctx.declarations(), options)
}

/// Are `invariants` satisfiable together? Each is asserted as `inv_*`.
pub fn generate_invariant_check(
    owner: &str,
    invariants: &[Condition],
    ctx: &EncodingContext,
    options: &GenerationOptions,
) -> GeneratedScript {
    let mut builder = ScriptBuilder::new(CheckKind::Invariant, owner, ctx);
    for (tag, term) in builder.encode_all(INV_PREFIX, AssertionKind::Invariant, invariants) {
        builder.assert(tag, term);
    }
    builder.finish(ctx.declarations(), options)
}

/// Is there any `base_type` value satisfying every constraint of
/// `type_name`? The value is declared as `var_name`; each constraint is
/// asserted as `ref_*`.
pub fn generate_refinement_check(
    type_name: &str,
    var_name: &str,
    base_type: &str,
    constraints: &[TypeConstraint],
    options: &GenerationOptions,
) -> GeneratedScript {
    let mut ctx = EncodingContext::default();
    ctx.declare_isl(var_name, base_type);
    let mut builder = ScriptBuilder::new(CheckKind::Refinement, type_name, &ctx);
    for (index, constraint) in constraints.iter().enumerate() {
        let encoded = encode_type_constraint(constraint, var_name, &ctx);
        if let Some((tag, term)) = builder.record(
            REF_PREFIX,
            AssertionKind::Refinement,
            index,
            constraint.to_string(),
            None,
            encoded,
        ) {
            builder.assert(tag, term);
        }
    }
    let declarations = ctx.declarations();
    builder.finish(declarations, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{create_context, SpecExpr};
    use isl_smt::sorts::SmtSort;

    fn ctx() -> EncodingContext {
        let mut ctx = create_context();
        ctx.declare("x", SmtSort::Int);
        ctx
    }

    fn x() -> SpecExpr {
        SpecExpr::ident("x")
    }

    #[test]
    fn postcondition_check_tags_and_asserts() {
        let script = generate_postcondition_check(
            "Behavior",
            &[x().gt(SpecExpr::int(0)).into()],
            &[x().gt(SpecExpr::int(0)).into(), x().lt(SpecExpr::int(100)).into()],
            &ctx(),
            &GenerationOptions::default(),
        );

        let tags: Vec<&str> = script.source_map.tags().collect();
        assert_eq!(
            tags,
            vec![
                "pre_Behavior_0",
                "post_Behavior_0",
                "post_Behavior_1",
                "neg_post_Behavior_0"
            ]
        );
        assert!(script
            .script
            .contains("(assert (! (> x 0) :named pre_Behavior_0))"));
        assert!(script
            .script
            .contains("(assert (! (not (and (> x 0) (< x 100))) :named neg_post_Behavior_0))"));
        assert!(!script.script.contains(":named post_Behavior_0"));
        assert_eq!(script.assertions.len(), 2);
        assert!(script.errors.is_empty());
    }

    #[test]
    fn preamble_order_and_trailer() {
        let script = generate_precondition_check(
            "Order",
            &[x().ge(SpecExpr::int(1)).into()],
            &ctx(),
            &GenerationOptions::default(),
        );
        let lines: Vec<&str> = script.script.lines().collect();
        assert_eq!(
            &lines[..6],
            &[
                "; precondition consistency check for Order",
                "(set-option :produce-models true)",
                "(set-option :produce-unsat-cores true)",
                "(set-logic ALL)",
                "(set-option :timeout 5000)",
                "(declare-const x Int)",
            ]
        );
        assert_eq!(
            &lines[lines.len() - 3..],
            &["(check-sat)", "(get-model)", "(get-unsat-core)"]
        );
    }

    #[test]
    fn owner_text_cannot_escape_the_header_comment() {
        let script = generate_precondition_check(
            "Evil\n(assert false)\r",
            &[x().gt(SpecExpr::int(0)).into()],
            &ctx(),
            &GenerationOptions::default(),
        );
        let first = script.script.lines().next().unwrap_or_default();
        assert!(first.starts_with("; precondition consistency check for Evil (assert false)"));
        let asserts: Vec<&str> = script
            .script
            .lines()
            .filter(|line| line.starts_with("(assert"))
            .collect();
        assert_eq!(
            asserts,
            vec!["(assert (! (> x 0) :named pre_Evil__assert_false___0))"]
        );
    }

    #[test]
    fn optional_directives_follow_options() {
        let options = GenerationOptions {
            logic: "QF_LIA".into(),
            timeout_ms: 0,
            produce_models: false,
            produce_unsat_cores: false,
        };
        let script =
            generate_invariant_check("Bank", &[x().ge(SpecExpr::int(0)).into()], &ctx(), &options);
        assert!(script.script.contains("(set-logic QF_LIA)"));
        assert!(!script.script.contains(":timeout"));
        assert!(!script.script.contains("get-model"));
        assert!(!script.script.contains("get-unsat-core"));
        assert!(script.script.contains(":named inv_Bank_0"));
    }

    #[test]
    fn failed_conditions_are_skipped_not_fatal() {
        let script = generate_precondition_check(
            "Order.Create",
            &[
                SpecExpr::ident("ghost").gt(SpecExpr::int(0)).into(),
                x().gt(SpecExpr::int(0)).into(),
            ],
            &ctx(),
            &GenerationOptions::default(),
        );
        assert_eq!(script.errors.len(), 1);
        assert_eq!(script.errors[0].index, 0);
        assert!(matches!(
            script.errors[0].error,
            EncodeError::UnknownIdentifier { .. }
        ));
        // The surviving condition keeps its original index.
        let tags: Vec<&str> = script.source_map.tags().collect();
        assert_eq!(tags, vec!["pre_Order_Create_1"]);
    }

    #[test]
    fn postcondition_check_without_encodable_goal_asserts_no_negation() {
        let script = generate_postcondition_check(
            "B",
            &[x().gt(SpecExpr::int(0)).into()],
            &[SpecExpr::ident("ghost").into()],
            &ctx(),
            &GenerationOptions::default(),
        );
        assert_eq!(script.errors.len(), 1);
        assert!(!script.script.contains("neg_post"));
        assert_eq!(script.assertions.len(), 1);
    }

    #[test]
    fn refinement_check_declares_the_value() {
        let script = generate_refinement_check(
            "Percentage",
            "value",
            "Decimal",
            &[
                TypeConstraint::Min { value: 0.0 },
                TypeConstraint::Max { value: 100.0 },
                TypeConstraint::Pattern { regex: ".*".into() },
            ],
            &GenerationOptions::default(),
        );
        assert_eq!(script.declarations, vec![Declaration::real("value")]);
        assert!(script.script.contains("(declare-const value Real)"));
        assert!(script
            .script
            .contains("(assert (! (>= value 0.0) :named ref_Percentage_0))"));
        assert!(script
            .script
            .contains("(assert (! (<= value 100.0) :named ref_Percentage_1))"));
        assert_eq!(script.errors.len(), 1);
    }

    #[test]
    fn uninterpreted_sorts_are_declared_once() {
        let mut ctx = ctx();
        ctx.declare_isl("a", "UUID").declare_isl("b", "UUID");
        let script = generate_invariant_check(
            "Ids",
            &[SpecExpr::ident("a").eq(SpecExpr::ident("b")).not().into()],
            &ctx,
            &GenerationOptions::default(),
        );
        assert_eq!(script.script.matches("(declare-sort UUID 0)").count(), 1);
    }

    #[test]
    fn sanitize_keeps_only_symbol_characters() {
        assert_eq!(sanitize_symbol("Order.Create-v2"), "Order_Create_v2");
        assert_eq!(make_tag(PRE_PREFIX, "a b", 3), "pre_a_b_3");
    }
}
