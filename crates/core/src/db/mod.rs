//! Project layout, configuration, and the SQLite graph store.
//!
//! - `ProjectConfig`: serializable project metadata and extraction settings.
//! - `ProjectLayout`: computed paths for the project's files.
//! - `GraphStore`: the persisted call graph, schema v1.
//! - `ProjectContext`: the three above, loaded together for a root.

mod config;
mod context;
mod graph_store;
mod layout;
mod models;
mod util;

use thiserror::Error;

pub use config::{DbConfig, ExtractionConfig, ProjectConfig};
pub use context::ProjectContext;
pub use graph_store::GraphStore;
pub use layout::ProjectLayout;
pub use models::BuildInfo;
pub use util::{load_project_config, open_graph_store, write_project_config};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
pub const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Error type for graph store operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("failed to store function `{name}`: {source}")]
    InsertFunction {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to store call {caller} -> {callee}: {source}")]
    InsertCall {
        caller: String,
        callee: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;
