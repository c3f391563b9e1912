//! In-memory scope directory.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::core::scope::ScopeDirectory;
use crate::core::task::ScopeId;

/// Set of live scopes; deleting a scope orphans its composite tasks.
#[derive(Debug, Default)]
pub struct InMemoryScopeDirectory {
    scopes: RwLock<HashSet<ScopeId>>,
}

impl InMemoryScopeDirectory {
    /// Directory containing the given scopes.
    pub fn with_scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScopeId>,
    {
        Self {
            scopes: RwLock::new(scopes.into_iter().map(Into::into).collect()),
        }
    }

    /// Register a scope.
    pub fn insert(&self, scope: impl Into<ScopeId>) {
        self.scopes.write().insert(scope.into());
    }

    /// Delete a scope; returns whether it existed.
    pub fn remove(&self, scope: &str) -> bool {
        self.scopes.write().remove(scope)
    }
}

impl ScopeDirectory for InMemoryScopeDirectory {
    fn scope_exists(&self, scope: &ScopeId) -> bool {
        self.scopes.read().contains(scope)
    }
}
