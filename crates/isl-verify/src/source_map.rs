//! Tag-to-source provenance for generated scripts.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use isl_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};

use crate::encoder::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    Precondition,
    Postcondition,
    Invariant,
    Refinement,
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssertionKind::Precondition => "precondition",
            AssertionKind::Postcondition => "postcondition",
            AssertionKind::Invariant => "invariant",
            AssertionKind::Refinement => "refinement",
        };
        f.write_str(name)
    }
}

/// One tagged assertion and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMappedAssertion {
    pub tag: String,
    pub kind: AssertionKind,
    pub owner: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub smt_text: String,
    #[serde(skip)]
    pub expr: Option<SmtTerm>,
}

impl SourceMappedAssertion {
    /// `tag (line:col): text`, omitting the parts that are unknown.
    pub fn describe(&self) -> String {
        let mut out = self.tag.clone();
        if let Some(loc) = self.location {
            out.push_str(&format!(" ({loc})"));
        }
        let text = self.source_text.as_deref().unwrap_or(&self.smt_text);
        out.push_str(": ");
        out.push_str(text);
        out
    }
}

/// Append-only collection of [`SourceMappedAssertion`]s keyed by tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceMap {
    entries: IndexMap<String, SourceMappedAssertion>,
    #[serde(skip)]
    by_kind: BTreeMap<AssertionKind, Vec<usize>>,
    #[serde(skip)]
    by_owner: BTreeMap<String, Vec<usize>>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns `false` and leaves the map unchanged when the
    /// tag is already present.
    pub fn insert(&mut self, entry: SourceMappedAssertion) -> bool {
        if self.entries.contains_key(&entry.tag) {
            return false;
        }
        let position = self.entries.len();
        self.by_kind.entry(entry.kind).or_default().push(position);
        self.by_owner
            .entry(entry.owner.clone())
            .or_default()
            .push(position);
        self.entries.insert(entry.tag.clone(), entry);
        true
    }

    pub fn get(&self, tag: &str) -> Option<&SourceMappedAssertion> {
        self.entries.get(tag)
    }

    pub fn by_kind(&self, kind: AssertionKind) -> Vec<&SourceMappedAssertion> {
        self.indexed(self.by_kind.get(&kind))
    }

    pub fn by_owner(&self, owner: &str) -> Vec<&SourceMappedAssertion> {
        self.indexed(self.by_owner.get(owner))
    }

    fn indexed(&self, positions: Option<&Vec<usize>>) -> Vec<&SourceMappedAssertion> {
        positions
            .into_iter()
            .flatten()
            .filter_map(|&i| self.entries.get_index(i).map(|(_, entry)| entry))
            .collect()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceMappedAssertion> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose serialized assertion equals `smt_text`.
    pub fn find_by_smt_text(&self, smt_text: &str) -> Option<&SourceMappedAssertion> {
        self.entries.values().find(|entry| entry.smt_text == smt_text)
    }

    /// Split `tags` into resolved entries and tags with no entry.
    pub fn resolve<'a, I>(&self, tags: I) -> (Vec<&SourceMappedAssertion>, Vec<String>)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for tag in tags {
            match self.entries.get(tag) {
                Some(entry) => resolved.push(entry),
                None => unresolved.push(tag.clone()),
            }
        }
        (resolved, unresolved)
    }
}
