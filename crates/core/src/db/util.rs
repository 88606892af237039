use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::db::{GraphStore, ProjectConfig, ProjectLayout};

/// Load the project config JSON from disk for a given layout.
pub fn load_project_config(layout: &ProjectLayout) -> Result<ProjectConfig> {
    let config_json = std::fs::read_to_string(&layout.project_config_path).with_context(|| {
        format!("Failed to read project config at {}", layout.project_config_path.display())
    })?;
    let config: ProjectConfig =
        serde_json::from_str(&config_json).context("Failed to parse project config JSON")?;
    Ok(config)
}

/// Write the project config JSON, creating the metadata directory if needed.
pub fn write_project_config(layout: &ProjectLayout, config: &ProjectConfig) -> Result<()> {
    std::fs::create_dir_all(&layout.meta_dir)
        .with_context(|| format!("Failed to create {}", layout.meta_dir.display()))?;
    let json = serde_json::to_string_pretty(config).context("Failed to serialize project config")?;
    std::fs::write(&layout.project_config_path, json).with_context(|| {
        format!("Failed to write project config at {}", layout.project_config_path.display())
    })?;
    Ok(())
}

/// Resolve the DB path (respecting relative/absolute config) and open the graph store.
pub fn open_graph_store(
    layout: &ProjectLayout,
    config: &ProjectConfig,
) -> Result<(PathBuf, GraphStore)> {
    let config_db_path = std::path::Path::new(&config.db.path);
    let db_path = if config_db_path.is_absolute() {
        config_db_path.to_path_buf()
    } else {
        layout.root.join(config_db_path)
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = GraphStore::open(&db_path)
        .with_context(|| format!("Failed to open graph database at {}", db_path.display()))?;
    Ok((db_path, store))
}
