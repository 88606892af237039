pub mod build;
pub mod project;
pub mod query;

pub use build::*;
pub use project::*;
pub use query::*;

use anyhow::Result;
use callmap_core::db::ProjectContext;
use tracing::debug;

use crate::{canonicalize_or_current, infer_project_name};

/// Open the project at `root`, using a default config if it was never initialized.
pub fn open_context(root: &str) -> Result<ProjectContext> {
    let root_path = canonicalize_or_current(root)?;
    let name = infer_project_name(&root_path);
    debug!(root = %root_path.display(), "opening project");
    ProjectContext::open_or_default(&root_path, &name)
}
