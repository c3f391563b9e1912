//! Scope existence lookups used for orphan detection.

use crate::core::task::ScopeId;

/// Answers whether a tenant/project scope still exists.
pub trait ScopeDirectory: Send + Sync {
    /// Whether `scope` exists.
    fn scope_exists(&self, scope: &ScopeId) -> bool;
}

/// Directory in which every scope exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllScopes;

impl ScopeDirectory for AllScopes {
    fn scope_exists(&self, _scope: &ScopeId) -> bool {
        true
    }
}
