use std::path::{Path, PathBuf};

/// Name of the metadata directory under a project root.
pub const META_DIR_NAME: &str = ".callmap";

/// Logical layout of a project on disk.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Root directory of the project; also the source root that gets indexed.
    pub root: PathBuf,
    /// Directory for internal metadata (.callmap).
    pub meta_dir: PathBuf,
    /// Path to the project config file (JSON).
    pub project_config_path: PathBuf,
    /// Path to the graph database file.
    pub db_path: PathBuf,
    /// Directory for exported graph documents (graphs).
    pub graphs_dir: PathBuf,
}

impl ProjectLayout {
    /// Compute the default layout for a project rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(META_DIR_NAME);
        let project_config_path = meta_dir.join("project.json");
        let db_path = meta_dir.join("graph.db");
        let graphs_dir = root.join("graphs");

        Self { root, meta_dir, project_config_path, db_path, graphs_dir }
    }

    /// Database path relative to `root`, for storing in `ProjectConfig`.
    pub fn db_path_relative_string(&self) -> String {
        match self.db_path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => self.db_path.to_string_lossy().to_string(),
        }
    }

    /// Where `export` writes when no output path is given.
    pub fn default_export_path(&self) -> PathBuf {
        self.graphs_dir.join("callgraph.json")
    }
}
