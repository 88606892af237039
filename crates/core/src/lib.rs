//! callmap-core
//!
//! Core library for extracting a call graph from a Rust source tree.
//!
//! Declarations are indexed with `syn`; call edges come either from a lexical
//! walk of each body or from an external analysis server spoken to over the
//! Language Server Protocol. The assembled graph is persisted in SQLite.
//!
//! All substantive logic lives here so it is testable and reusable from
//! multiple frontends.

pub mod model;
pub mod index;
pub mod analysis;
pub mod db;
pub mod services;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
