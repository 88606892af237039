pub mod pipeline;
pub mod resolver;

pub use pipeline::{
    build_graph, build_graph_with_resolver, run_build, BuildReport, ModeUsed, PipelineError,
};
