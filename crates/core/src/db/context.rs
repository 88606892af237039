use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::db::{load_project_config, open_graph_store, GraphStore, ProjectConfig, ProjectLayout};

/// Convenience wrapper bundling layout, config, db path, and an open GraphStore.
#[derive(Debug)]
pub struct ProjectContext {
    pub layout: ProjectLayout,
    pub config: ProjectConfig,
    pub db_path: PathBuf,
    pub store: GraphStore,
}

impl ProjectContext {
    /// Load project config and open the database for an initialized root.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        let layout = ProjectLayout::new(root);
        let config = load_project_config(&layout)?;
        Self::with_config(layout, config)
    }

    /// Like [`from_root`](Self::from_root), but an uninitialized root gets a
    /// default config (not written to disk) named `default_name`.
    pub fn open_or_default(root: impl AsRef<Path>, default_name: &str) -> Result<Self> {
        let layout = ProjectLayout::new(root);
        let config = if layout.project_config_path.is_file() {
            load_project_config(&layout)?
        } else {
            ProjectConfig::new(default_name, layout.db_path_relative_string())
        };
        Self::with_config(layout, config)
    }

    fn with_config(layout: ProjectLayout, config: ProjectConfig) -> Result<Self> {
        let (db_path, store) = open_graph_store(&layout, &config)?;
        Ok(Self { layout, config, db_path, store })
    }
}
