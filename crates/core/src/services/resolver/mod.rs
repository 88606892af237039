//! Client side of a Language Server Protocol connection to a code-analysis
//! server, used to resolve call edges precisely.

pub mod protocol;
pub mod session;
pub mod transport;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::index::Position;
use crate::model::KnownNames;

pub use protocol::{CallHierarchyItem, OutgoingCall};
pub use session::{ResolverSession, SessionError, SessionState};

/// Environment variable that overrides the configured server program.
pub const RESOLVER_BIN_ENV: &str = "CALLMAP_RESOLVER_BIN";

/// How to launch and talk to the analysis server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub program: String,
    pub args: Vec<String>,
    pub request_timeout_ms: u64,
    pub language_id: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: "rust-analyzer".to_string(),
            args: Vec::new(),
            request_timeout_ms: 30_000,
            language_id: "rust".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The program to spawn, honoring [`RESOLVER_BIN_ENV`].
    pub fn resolved_program(&self) -> String {
        std::env::var(RESOLVER_BIN_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.program.clone())
    }
}

/// Something that can answer "which known functions does the function at
/// this position call?".
pub trait CallResolver {
    fn register_document(&self, path: &Path, text: &str) -> Result<(), SessionError>;

    /// Distinct callees of the function whose name sits at `position`,
    /// restricted to `known`.
    fn resolve_callees(
        &self,
        path: &Path,
        position: Position,
        known: &KnownNames,
    ) -> Result<Vec<String>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: ResolverConfig = serde_json::from_str(r#"{"request_timeout_ms": 500}"#).unwrap();
        assert_eq!(cfg.program, "rust-analyzer");
        assert_eq!(cfg.request_timeout(), Duration::from_millis(500));
    }
}
