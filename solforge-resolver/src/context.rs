use solforge_types::source::{ResolutionDiagnostic, SourceModule};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

/// Per-invocation resolution state.
///
/// One context is owned by exactly one root call. All mutation goes through
/// the context's own mutex, so branches of one traversal may run on different
/// threads without sharing anything with other invocations.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    state: Mutex<ContextState>,
}

#[derive(Debug, Default)]
struct ContextState {
    visited: BTreeSet<String>,
    licenses: BTreeSet<String>,
    pragma: Option<String>,
    modules: Vec<SourceModule>,
    diagnostics: Vec<ResolutionDiagnostic>,
    unresolved: u64,
}

/// Everything a finished traversal accumulated.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    /// Modules in dependency-first order.
    pub modules: Vec<SourceModule>,
    /// Sorted, deduplicated.
    pub licenses: Vec<String>,
    pub pragma: Option<String>,
    pub diagnostics: Vec<ResolutionDiagnostic>,
    pub unresolved_import_count: u64,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check-and-insert in one step. Returns `false` if `id` was already claimed.
    pub fn claim(&self, id: &str) -> bool {
        self.lock().visited.insert(id.to_string())
    }

    pub fn is_visited(&self, id: &str) -> bool {
        self.lock().visited.contains(id)
    }

    /// Record a module's directives. The first pragma seen wins.
    pub fn record_directives(&self, pragma: Option<&str>, licenses: &[String]) {
        let mut state = self.lock();
        if state.pragma.is_none() {
            state.pragma = pragma.map(str::to_string);
        }
        state.licenses.extend(licenses.iter().cloned());
    }

    /// Append a fully processed module to the output buffer.
    pub fn push_module(&self, module: SourceModule) {
        self.lock().modules.push(module);
    }

    pub fn record_unresolved(&self, diagnostic: ResolutionDiagnostic) {
        let mut state = self.lock();
        state.unresolved += 1;
        state.diagnostics.push(diagnostic);
    }

    pub fn into_graph(self) -> ResolvedGraph {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ResolvedGraph {
            modules: state.modules,
            licenses: state.licenses.into_iter().collect(),
            pragma: state.pragma,
            diagnostics: state.diagnostics,
            unresolved_import_count: state.unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_check_and_insert() {
        let ctx = ResolutionContext::new();
        assert!(ctx.claim("a.sol"));
        assert!(!ctx.claim("a.sol"));
        assert!(ctx.is_visited("a.sol"));
        assert!(!ctx.is_visited("b.sol"));
    }

    #[test]
    fn first_pragma_wins_and_licenses_merge_sorted() {
        let ctx = ResolutionContext::new();
        ctx.record_directives(None, &["MIT".to_string()]);
        ctx.record_directives(
            Some("pragma solidity ^0.8.0;"),
            &["Apache-2.0".to_string(), "MIT".to_string()],
        );
        ctx.record_directives(Some("pragma solidity 0.7.6;"), &[]);

        let graph = ctx.into_graph();
        assert_eq!(graph.pragma.as_deref(), Some("pragma solidity ^0.8.0;"));
        assert_eq!(graph.licenses, vec!["Apache-2.0", "MIT"]);
    }

    #[test]
    fn context_is_sync() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<ResolutionContext>();
    }
}
