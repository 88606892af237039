use serde::{Deserialize, Serialize};

use crate::analysis::{ExtractionMode, FallbackPolicy};
use crate::index::{IndexOptions, DEFAULT_EXCLUDED_DIRS};
use crate::services::resolver::ResolverConfig;

/// Location of the graph database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Path to the database file (typically relative to project root).
    pub path: String,
}

impl DbConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// How a build discovers declarations and extracts edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub mode: ExtractionMode,
    pub fallback: FallbackPolicy,
    /// Directory names never descended into during discovery.
    pub excluded_dirs: Vec<String>,
    pub resolver: ResolverConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::default(),
            fallback: FallbackPolicy::default(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions { excluded_dirs: self.excluded_dirs.clone() }
    }
}

/// Serializable configuration describing a callmap project.
///
/// Lives at `.callmap/project.json` in the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Human-friendly project name.
    pub name: String,
    pub description: Option<String>,
    /// Version of the config format.
    pub config_version: String,
    pub db: DbConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>, db_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            config_version: "0.1.0".to_string(),
            db: DbConfig::new(db_path),
            extraction: ExtractionConfig::default(),
        }
    }
}
