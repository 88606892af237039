use anyhow::{Context, Result};
use callmap_core::analysis::{ExtractionMode, FallbackPolicy};
use callmap_core::services::{run_build, BuildReport};

use crate::commands::open_context;

/// Rebuild the stored graph from the sources under `root`.
pub fn build_command(
    root: &str,
    mode: Option<ExtractionMode>,
    fallback: Option<FallbackPolicy>,
    resolver: Option<String>,
    json: bool,
) -> Result<BuildReport> {
    let mut ctx = open_context(root)?;
    if let Some(mode) = mode {
        ctx.config.extraction.mode = mode;
    }
    if let Some(fallback) = fallback {
        ctx.config.extraction.fallback = fallback;
    }
    if let Some(program) = resolver {
        ctx.config.extraction.resolver.program = program;
    }

    let (_graph, report) = run_build(&mut ctx)
        .with_context(|| format!("Build failed for {}", ctx.layout.root.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        println!("  DB: {}", ctx.db_path.display());
    }
    Ok(report)
}

fn print_report(report: &BuildReport) {
    println!("Built call graph ({}):", report.used.as_str());
    println!("  Files indexed: {}", report.files);
    println!("  Functions: {} ({} declarations)", report.functions, report.declarations);
    println!("  Edges: {}", report.edges);
    if report.requested != ExtractionMode::Lexical {
        println!("  Failed queries: {}", report.query_failures);
        println!("  Lexical fallback: {} functions", report.fallback_functions);
    }
    if !report.skipped_files.is_empty() {
        println!("  Skipped files:");
        for path in &report.skipped_files {
            println!("    - {}", path.display());
        }
    }
}
