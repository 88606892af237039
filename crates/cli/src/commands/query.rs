use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use callmap_core::analysis::{callees_of, roots};
use serde::Serialize;

use crate::canonicalize_or_current;
use crate::commands::open_context;

#[derive(Debug, Serialize)]
pub struct FunctionView {
    pub name: String,
    pub signature: String,
    pub callees: Vec<String>,
    pub callers: Vec<String>,
    pub definition: String,
}

/// Print one stored function, or the whole stored graph when no name is given.
pub fn show_command(root: &str, name: Option<&str>, json: bool) -> Result<()> {
    let ctx = open_context(root)?;
    let Some(name) = name else {
        let graph = ctx.store.load().context("Failed to read stored graph")?;
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    };
    let node = ctx
        .store
        .function(name)
        .context("Failed to query graph")?
        .ok_or_else(|| anyhow!("Function not found in stored graph: {name}"))?;
    let callers = ctx.store.callers(name).context("Failed to query callers")?;

    let view = FunctionView {
        name: name.to_string(),
        signature: node.signature,
        callees: node.callees,
        callers,
        definition: node.definition,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    println!("{}", view.signature);
    println!("  Calls: {}", join_or_none(&view.callees));
    println!("  Called by: {}", join_or_none(&view.callers));
    println!();
    println!("{}", view.definition);
    Ok(())
}

/// List the functions `name` calls.
pub fn callees_command(root: &str, name: &str, json: bool) -> Result<()> {
    let ctx = open_context(root)?;
    let node = ctx
        .store
        .function(name)
        .context("Failed to query graph")?
        .ok_or_else(|| anyhow!("Function not found in stored graph: {name}"))?;
    print_names(&node.callees, json)
}

/// List the functions that call `name`.
pub fn callers_command(root: &str, name: &str, json: bool) -> Result<()> {
    let ctx = open_context(root)?;
    if ctx.store.function(name).context("Failed to query graph")?.is_none() {
        return Err(anyhow!("Function not found in stored graph: {name}"));
    }
    let callers = ctx.store.callers(name).context("Failed to query callers")?;
    print_names(&callers, json)
}

#[derive(Debug, Serialize)]
pub struct RootView {
    pub name: String,
    pub callees: Vec<String>,
}

/// List the functions nothing else calls, each with its direct callees.
pub fn roots_command(root: &str, json: bool) -> Result<Vec<RootView>> {
    let ctx = open_context(root)?;
    let graph = ctx.store.load().context("Failed to read stored graph")?;
    let views: Vec<RootView> = roots(&graph)
        .into_iter()
        .map(|name| {
            let callees = callees_of(&graph, &name).unwrap_or_default().to_vec();
            RootView { name, callees }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else if views.is_empty() {
        println!("(none)");
    } else {
        for view in &views {
            println!("{} -> {}", view.name, join_or_none(&view.callees));
        }
    }
    Ok(views)
}

/// Write the stored graph as a JSON document and return where it went.
pub fn export_command(root: &str, out: Option<&str>) -> Result<PathBuf> {
    let ctx = open_context(root)?;
    let graph = ctx.store.load().context("Failed to read stored graph")?;

    let path = match out {
        Some(p) => canonicalize_or_current(p)?,
        None => ctx.layout.default_export_path(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&graph)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Exported {} functions to {}", graph.len(), path.display());
    Ok(path)
}

fn print_names(names: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(names)?);
    } else if names.is_empty() {
        println!("(none)");
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}
