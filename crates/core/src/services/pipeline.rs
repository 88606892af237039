//! One build: index, extract edges, assemble, save.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::{
    assemble, extract_lexical, extract_lexical_for, extract_precise, merge_calls, ExtractionMode,
    FallbackPolicy,
};
use crate::db::{BuildInfo, DbError, ExtractionConfig, ProjectContext};
use crate::index::{DeclarationIndex, IndexError};
use crate::model::{edge_count, CallGraph, CallMap};
use crate::services::resolver::{CallResolver, ResolverSession, SessionError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("precision extraction failed: {0}")]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] DbError),
}

/// Edge source that actually produced a build's edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeUsed {
    Lexical,
    Precision,
    /// Precision for some functions, lexical fallback for the rest.
    Mixed,
}

impl ModeUsed {
    pub fn as_str(self) -> &'static str {
        match self {
            ModeUsed::Lexical => "lexical",
            ModeUsed::Precision => "precision",
            ModeUsed::Mixed => "mixed",
        }
    }
}

/// Summary of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub requested: ExtractionMode,
    pub used: ModeUsed,
    pub files: usize,
    /// Declarations found, name collisions included.
    pub declarations: usize,
    /// Nodes in the assembled graph.
    pub functions: usize,
    pub edges: usize,
    pub skipped_files: Vec<PathBuf>,
    pub query_failures: usize,
    /// Functions whose edges came from the lexical fallback.
    pub fallback_functions: usize,
}

struct EdgeStats {
    used: ModeUsed,
    query_failures: usize,
    fallback_functions: usize,
}

impl EdgeStats {
    fn lexical() -> Self {
        Self { used: ModeUsed::Lexical, query_failures: 0, fallback_functions: 0 }
    }
}

/// Build the call graph for the source tree under `root`.
pub fn build_graph(
    root: &Path,
    config: &ExtractionConfig,
) -> Result<(CallGraph, BuildReport), PipelineError> {
    let index = DeclarationIndex::build(root, &config.index_options())?;
    info!(
        files = index.sources().len(),
        declarations = index.functions().len(),
        skipped = index.skipped().len(),
        "indexed sources"
    );

    let (calls, stats) = match config.mode {
        ExtractionMode::Lexical => (extract_lexical(&index), EdgeStats::lexical()),
        ExtractionMode::Precision => {
            let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
            match ResolverSession::start(&config.resolver, &root) {
                Ok(session) => {
                    let result = precise_edges(&session, &index, config.fallback);
                    session.close();
                    result?
                }
                Err(err) => match config.fallback {
                    FallbackPolicy::Abort => return Err(err.into()),
                    FallbackPolicy::Lexical => {
                        warn!(
                            error = %err,
                            "analysis server unavailable, using lexical extraction"
                        );
                        let stats = EdgeStats {
                            used: ModeUsed::Lexical,
                            query_failures: 0,
                            fallback_functions: bodies(&index),
                        };
                        (extract_lexical(&index), stats)
                    }
                },
            }
        }
    };

    Ok(finish(&index, config.mode, calls, stats))
}

/// Build from an existing index using `resolver` for edges.
pub fn build_graph_with_resolver<R>(
    index: &DeclarationIndex,
    resolver: &R,
    fallback: FallbackPolicy,
) -> Result<(CallGraph, BuildReport), PipelineError>
where
    R: CallResolver + ?Sized,
{
    let (calls, stats) = precise_edges(resolver, index, fallback)?;
    Ok(finish(index, ExtractionMode::Precision, calls, stats))
}

fn precise_edges<R>(
    resolver: &R,
    index: &DeclarationIndex,
    fallback: FallbackPolicy,
) -> Result<(CallMap, EdgeStats), PipelineError>
where
    R: CallResolver + ?Sized,
{
    let outcome = extract_precise(resolver, index);
    let mut calls = outcome.calls;
    let mut stats = EdgeStats {
        used: ModeUsed::Precision,
        query_failures: outcome.query_failures,
        fallback_functions: 0,
    };

    if let Some(err) = outcome.transport_error {
        if fallback == FallbackPolicy::Abort {
            return Err(err.into());
        }
        warn!(
            error = %err,
            remaining = outcome.unresolved.len(),
            "analysis server lost, finishing with lexical extraction"
        );
        let lexical = extract_lexical_for(outcome.unresolved.iter().copied(), index.names());
        merge_calls(&mut calls, lexical);
        stats.fallback_functions = outcome.unresolved.len();
        stats.used = if outcome.resolved == 0 { ModeUsed::Lexical } else { ModeUsed::Mixed };
    }
    Ok((calls, stats))
}

fn bodies(index: &DeclarationIndex) -> usize {
    index.functions().iter().filter(|f| f.has_body()).count()
}

fn finish(
    index: &DeclarationIndex,
    requested: ExtractionMode,
    calls: CallMap,
    stats: EdgeStats,
) -> (CallGraph, BuildReport) {
    let graph = assemble(&index.details(), &calls);
    let report = BuildReport {
        requested,
        used: stats.used,
        files: index.sources().len(),
        declarations: index.functions().len(),
        functions: graph.len(),
        edges: edge_count(&graph),
        skipped_files: index.skipped().iter().map(|s| s.path.clone()).collect(),
        query_failures: stats.query_failures,
        fallback_functions: stats.fallback_functions,
    };
    info!(
        mode = report.used.as_str(),
        functions = report.functions,
        edges = report.edges,
        "call graph assembled"
    );
    (graph, report)
}

/// Build the project's graph and persist it with its build info.
pub fn run_build(ctx: &mut ProjectContext) -> Result<(CallGraph, BuildReport), PipelineError> {
    let (graph, report) = build_graph(&ctx.layout.root, &ctx.config.extraction)?;
    let info = BuildInfo::now(report.used.as_str(), report.functions, report.edges);
    ctx.store.save_with_info(&graph, Some(&info))?;
    info!(db = %ctx.db_path.display(), "graph stored");
    Ok((graph, report))
}
