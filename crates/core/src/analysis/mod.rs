//! Edge sources and graph assembly.
//!
//! Two interchangeable edge sources produce a [`CallMap`] from a
//! [`DeclarationIndex`](crate::index::DeclarationIndex): the lexical walker
//! and the precision pass driven by an analysis server. The assembler merges
//! either one with declaration details into the final [`CallGraph`](crate::model::CallGraph).

pub mod assembler;
pub mod lexical;
pub mod precision;

use serde::{Deserialize, Serialize};

use crate::model::CallMap;

pub use assembler::{assemble, callees_of, callers_of, dangling_edges, roots};
pub use lexical::{callees_in_block, extract_lexical, extract_lexical_for};
pub use precision::{extract_precise, PrecisionOutcome};

/// Which edge source a build asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    #[default]
    Lexical,
    Precision,
}

impl ExtractionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMode::Lexical => "lexical",
            ExtractionMode::Precision => "precision",
        }
    }
}

/// What to do when the analysis server cannot serve a precision build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Use lexical edges for whatever precision could not cover.
    #[default]
    Lexical,
    Abort,
}

/// Merge `from` into `into`, keeping each caller's callees distinct.
pub fn merge_calls(into: &mut CallMap, from: CallMap) {
    for (caller, callees) in from {
        let entry = into.entry(caller).or_default();
        for callee in callees {
            if !entry.contains(&callee) {
                entry.push(callee);
            }
        }
    }
}
