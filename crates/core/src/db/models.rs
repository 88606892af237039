use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about the build that produced the stored graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// RFC 3339 UTC timestamp.
    pub built_at: String,
    /// Extraction mode actually used: `lexical`, `precision`, or `mixed`.
    pub mode: String,
    pub functions: i64,
    pub edges: i64,
}

impl BuildInfo {
    /// Stamp a build that finished now.
    pub fn now(mode: impl Into<String>, functions: usize, edges: usize) -> Self {
        Self {
            built_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            mode: mode.into(),
            functions: functions as i64,
            edges: edges as i64,
        }
    }
}
