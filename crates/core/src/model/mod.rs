//! Core data model for the call graph.
//!
//! The graph is keyed purely by bare function name. Two functions sharing a
//! name anywhere in the corpus collapse into one node.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// One uniquely named function discovered in the corpus.
///
/// Field order matches the exported JSON document: `callees`, `signature`,
/// `definition`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNode {
    /// Names of known functions this function calls. Never contains duplicates.
    pub callees: Vec<String>,
    /// The `fn` header as written in the source.
    pub signature: String,
    /// The full definition as written in the source.
    pub definition: String,
}

impl FunctionNode {
    pub fn new(signature: impl Into<String>, definition: impl Into<String>) -> Self {
        Self { callees: Vec::new(), signature: signature.into(), definition: definition.into() }
    }

    /// Builder-style helper used mostly by tests and fixtures.
    pub fn with_callees<I, S>(mut self, callees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.callees = callees.into_iter().map(Into::into).collect();
        self
    }
}

/// Signature and definition text for one declared name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDetail {
    pub signature: String,
    pub definition: String,
}

/// The assembled graph: every declared name maps to its node.
///
/// A `BTreeMap` keeps the exported document stable between runs; key order
/// carries no meaning.
pub type CallGraph = BTreeMap<String, FunctionNode>;

/// Raw output of an edge source: caller name to callee names.
pub type CallMap = BTreeMap<String, Vec<String>>;

/// Set of every declared function name in the corpus.
pub type KnownNames = BTreeSet<String>;

/// Total number of edges in a graph.
pub fn edge_count(graph: &CallGraph) -> usize {
    graph.values().map(|node| node.callees.len()).sum()
}

/// Compare two graphs ignoring the order of each callee list.
pub fn same_graph(a: &CallGraph, b: &CallGraph) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(name, left)| match b.get(name) {
        Some(right) => {
            let l: BTreeSet<&String> = left.callees.iter().collect();
            let r: BTreeSet<&String> = right.callees.iter().collect();
            left.signature == right.signature
                && left.definition == right.definition
                && left.callees.len() == right.callees.len()
                && l == r
        }
        None => false,
    })
}
