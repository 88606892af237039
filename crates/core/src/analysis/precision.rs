//! Precision call extraction through a [`CallResolver`].

use tracing::{debug, warn};

use crate::index::{DeclarationIndex, DeclaredFunction};
use crate::model::CallMap;
use crate::services::resolver::{CallResolver, SessionError};

/// What a precision pass produced.
#[derive(Debug, Default)]
pub struct PrecisionOutcome<'a> {
    pub calls: CallMap,
    /// Functions whose query succeeded.
    pub resolved: usize,
    /// Per-function query failures the pass continued past.
    pub query_failures: usize,
    /// Functions never queried because the connection was lost.
    pub unresolved: Vec<&'a DeclaredFunction>,
    /// The error that ended the pass early, if any.
    pub transport_error: Option<SessionError>,
}

/// Register every source with the resolver, then ask it for the callees of
/// each declaration that has a body.
///
/// A failed query costs only that function's edges. A fatal error stops the
/// pass and leaves the remaining functions in `unresolved`.
pub fn extract_precise<'a, R>(resolver: &R, index: &'a DeclarationIndex) -> PrecisionOutcome<'a>
where
    R: CallResolver + ?Sized,
{
    let mut outcome = PrecisionOutcome::default();
    let queue: Vec<&DeclaredFunction> = index.functions().iter().filter(|f| f.has_body()).collect();

    for source in index.sources() {
        if let Err(err) = resolver.register_document(&source.path, &source.text) {
            warn!(file = %source.path.display(), error = %err, "document registration failed");
            if err.is_fatal() {
                outcome.unresolved = queue;
                outcome.transport_error = Some(err);
                return outcome;
            }
        }
    }

    for (i, function) in queue.iter().enumerate() {
        match resolver.resolve_callees(&function.file, function.position, index.names()) {
            Ok(callees) => {
                outcome.resolved += 1;
                let entry = outcome.calls.entry(function.name.clone()).or_default();
                for callee in callees {
                    if !entry.contains(&callee) {
                        entry.push(callee);
                    }
                }
            }
            Err(err) if err.is_fatal() => {
                warn!(function = %function.name, error = %err, "lost analysis server");
                outcome.unresolved = queue[i..].to_vec();
                outcome.transport_error = Some(err);
                break;
            }
            Err(err) => {
                warn!(
                    function = %function.name,
                    file = %function.file.display(),
                    error = %err,
                    "call query failed, no edges recorded"
                );
                outcome.query_failures += 1;
            }
        }
    }

    debug!(
        resolved = outcome.resolved,
        failures = outcome.query_failures,
        unresolved = outcome.unresolved.len(),
        "precision pass finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Position;
    use crate::model::KnownNames;
    use std::cell::Cell;
    use std::path::Path;

    /// Answers every query with every known name, failing on a chosen call.
    struct Scripted {
        calls: Cell<usize>,
        fail_at: usize,
        fatal: bool,
    }

    impl CallResolver for Scripted {
        fn register_document(&self, _: &Path, _: &str) -> Result<(), SessionError> {
            Ok(())
        }

        fn resolve_callees(
            &self,
            _: &Path,
            _: Position,
            known: &KnownNames,
        ) -> Result<Vec<String>, SessionError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n == self.fail_at {
                return Err(if self.fatal {
                    SessionError::TransportClosed
                } else {
                    SessionError::Server { code: -32603, message: "boom".into() }
                });
            }
            Ok(known.iter().cloned().collect())
        }
    }

    fn index() -> DeclarationIndex {
        DeclarationIndex::from_sources([("lib.rs", "fn a() {}\nfn b() {}\nfn c() {}\n")])
    }

    #[test]
    fn query_failure_costs_one_function() {
        let index = index();
        let resolver = Scripted { calls: Cell::new(0), fail_at: 1, fatal: false };
        let outcome = extract_precise(&resolver, &index);
        assert_eq!(outcome.resolved, 2);
        assert_eq!(outcome.query_failures, 1);
        assert!(outcome.calls.contains_key("a"));
        assert!(!outcome.calls.contains_key("b"));
        assert!(outcome.transport_error.is_none());
    }

    #[test]
    fn fatal_error_leaves_rest_unresolved() {
        let index = index();
        let resolver = Scripted { calls: Cell::new(0), fail_at: 1, fatal: true };
        let outcome = extract_precise(&resolver, &index);
        assert_eq!(outcome.resolved, 1);
        let names: Vec<_> = outcome.unresolved.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(matches!(outcome.transport_error, Some(SessionError::TransportClosed)));
    }
}
