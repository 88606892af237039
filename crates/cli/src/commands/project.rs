use std::fs;

use anyhow::{Context, Result};
use callmap_core::analysis::ExtractionMode;
use callmap_core::db::{
    load_project_config, open_graph_store, write_project_config, BuildInfo, ExtractionConfig,
    ProjectConfig, ProjectLayout,
};
use serde::Serialize;

use crate::commands::open_context;
use crate::{canonicalize_or_current, infer_project_name};

#[derive(Debug, Serialize)]
pub struct ProjectInfoSnapshot {
    pub name: String,
    pub root: String,
    pub initialized: bool,
    pub config_file: String,
    pub config_version: String,
    pub db_path: String,
    pub graphs_dir: String,
    pub extraction: ExtractionConfig,
    pub functions: usize,
    pub edges: usize,
    pub last_build: Option<BuildInfo>,
}

/// Initialize a new project at `root`.
pub fn init_project_command(
    root: &str,
    name: Option<String>,
    mode: Option<ExtractionMode>,
) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);

    let project_name = match name {
        Some(n) => n,
        None => infer_project_name(&root_path),
    };

    fs::create_dir_all(&layout.graphs_dir)
        .with_context(|| format!("Failed to create graphs dir: {}", layout.graphs_dir.display()))?;

    let mut config = ProjectConfig::new(&project_name, layout.db_path_relative_string());
    if let Some(mode) = mode {
        config.extraction.mode = mode;
    }
    write_project_config(&layout, &config)?;

    // Create the database immediately so follow-on commands can rely on it.
    open_graph_store(&layout, &config)?;

    println!("Initialized callmap project:");
    println!("  Name: {}", project_name);
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.project_config_path.display());
    println!("  DB path (relative): {}", config.db.path);
    println!("  Graphs dir: {}", layout.graphs_dir.display());
    println!("  Extraction mode: {}", config.extraction.mode.as_str());

    Ok(())
}

/// Show configuration and stored-graph summary for a project.
pub fn project_info_command(root: &str, json: bool) -> Result<()> {
    let ctx = open_context(root)?;
    let layout = &ctx.layout;
    let initialized = layout.project_config_path.is_file();
    if initialized {
        // Surface a broken config instead of silently using defaults.
        load_project_config(layout)?;
    }

    let graph = ctx.store.load().context("Failed to read stored graph")?;
    let last_build = ctx.store.build_info().context("Failed to read build info")?;
    let snapshot = ProjectInfoSnapshot {
        name: ctx.config.name.clone(),
        root: layout.root.display().to_string(),
        initialized,
        config_file: layout.project_config_path.display().to_string(),
        config_version: ctx.config.config_version.clone(),
        db_path: ctx.db_path.display().to_string(),
        graphs_dir: layout.graphs_dir.display().to_string(),
        extraction: ctx.config.extraction.clone(),
        functions: graph.len(),
        edges: callmap_core::model::edge_count(&graph),
        last_build,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Project: {}", snapshot.name);
    println!("  Root: {}", snapshot.root);
    if snapshot.initialized {
        println!("  Config: {} (v{})", snapshot.config_file, snapshot.config_version);
    } else {
        println!("  Config: not initialized (defaults)");
    }
    println!("  DB: {}", snapshot.db_path);
    println!(
        "  Extraction: {} (fallback: {:?}, resolver: {})",
        snapshot.extraction.mode.as_str(),
        snapshot.extraction.fallback,
        snapshot.extraction.resolver.resolved_program()
    );
    println!("  Stored graph: {} functions, {} edges", snapshot.functions, snapshot.edges);
    match &snapshot.last_build {
        Some(info) => println!("  Last build: {} ({})", info.built_at, info.mode),
        None => println!("  Last build: none"),
    }
    Ok(())
}
