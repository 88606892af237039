//! Graph assembly: merge declaration details with an edge source.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CallGraph, CallMap, FunctionDetail, FunctionNode};

/// Build the final graph from declaration details and caller→callee edges.
///
/// Every declared name gets a node, with an empty callee list when the edge
/// source has nothing for it. Callers and callees that are not declared are
/// dropped, and duplicate callees collapse, so the result always satisfies
/// the closed-world invariant.
pub fn assemble(details: &BTreeMap<String, FunctionDetail>, calls: &CallMap) -> CallGraph {
    let mut graph: CallGraph = details
        .iter()
        .map(|(name, detail)| {
            (name.clone(), FunctionNode::new(detail.signature.clone(), detail.definition.clone()))
        })
        .collect();

    for (caller, callees) in calls {
        let Some(node) = graph.get_mut(caller) else { continue };
        for callee in callees {
            if details.contains_key(callee) && !node.callees.contains(callee) {
                node.callees.push(callee.clone());
            }
        }
    }
    graph
}

/// Edges whose callee is not a node in the graph.
pub fn dangling_edges(graph: &CallGraph) -> Vec<(String, String)> {
    graph
        .iter()
        .flat_map(|(caller, node)| {
            node.callees
                .iter()
                .filter(|callee| !graph.contains_key(*callee))
                .map(move |callee| (caller.clone(), callee.clone()))
        })
        .collect()
}

/// Names the given function calls, or `None` if it is not in the graph.
pub fn callees_of<'g>(graph: &'g CallGraph, name: &str) -> Option<&'g [String]> {
    graph.get(name).map(|node| node.callees.as_slice())
}

/// Names of every function that calls `name`, sorted.
pub fn callers_of(graph: &CallGraph, name: &str) -> Vec<String> {
    graph
        .iter()
        .filter(|(_, node)| node.callees.iter().any(|c| c == name))
        .map(|(caller, _)| caller.clone())
        .collect()
}

/// Functions that no other function calls. Self-recursion does not count.
pub fn roots(graph: &CallGraph) -> Vec<String> {
    let called: BTreeSet<&str> = graph
        .iter()
        .flat_map(|(caller, node)| {
            node.callees.iter().filter(move |c| *c != caller).map(String::as_str)
        })
        .collect();
    graph.keys().filter(|name| !called.contains(name.as_str())).cloned().collect()
}
