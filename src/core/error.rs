//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::task::TaskKind;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed submission: wrong payload shape for the kind, empty composite list.
    #[error("validation error: {0}")]
    Validation(String),
    /// No handler is registered for the task kind.
    #[error("no handler registered for task kind {0}")]
    UnknownKind(TaskKind),
    /// Immediate action identifier is not registered.
    #[error("unknown action: {0}")]
    UnknownAction(String),
    /// A start or poll operation faulted.
    #[error("handler fault: {0}")]
    Handler(String),
    /// Durable store failure with context.
    #[error("store error: {0}")]
    Store(String),
    /// Invalid scheduler configuration.
    #[error("config invalid: {0}")]
    Config(String),
}

impl SchedulerError {
    /// Whether the error stems from the submission itself rather than the
    /// infrastructure behind it.
    #[must_use]
    pub const fn is_submission_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::UnknownKind(_) | Self::UnknownAction(_)
        )
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
