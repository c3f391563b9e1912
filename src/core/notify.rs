//! Scope-addressed task notifications.

use crate::core::task::{ScopeId, TaskId};

/// Event emitted towards the real-time fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Share of the work completed, in `0.0..=1.0`.
    Progress {
        /// Task reporting progress.
        task: TaskId,
        /// Completed fraction.
        fraction: f64,
    },
    /// Task finished.
    Done {
        /// Finished task.
        task: TaskId,
    },
    /// A composite task submitted its next sub-task. Internal only: it has
    /// no wire text and is never pushed to the fan-out.
    SubTaskStarted {
        /// Composite task.
        task: TaskId,
        /// Submitted sub-task.
        child: TaskId,
    },
}

impl TaskEvent {
    /// Task the event is addressed to.
    #[must_use]
    pub const fn task(&self) -> TaskId {
        match self {
            Self::Progress { task, .. } | Self::Done { task } | Self::SubTaskStarted { task, .. } => {
                *task
            }
        }
    }

    /// Whether this is a progress event.
    #[must_use]
    pub const fn is_progress(&self) -> bool {
        matches!(self, Self::Progress { .. })
    }

    /// Whether this is a final DONE event.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// Text pushed to the real-time fan-out, if the event has one.
    #[must_use]
    pub fn wire_text(&self) -> Option<String> {
        match self {
            Self::Progress { task, fraction } => Some(format!("task:{task}:progress:{fraction}")),
            Self::Done { task } => Some(format!("task:{task}:state:DONE")),
            Self::SubTaskStarted { .. } => None,
        }
    }
}

/// Delivery of task events to a scope.
pub trait Notifier: Send + Sync {
    /// Deliver an event addressed to `scope`.
    fn notify(&self, scope: &ScopeId, event: TaskEvent);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, scope: &ScopeId, event: TaskEvent) {
        match event.wire_text() {
            Some(text) => tracing::debug!(scope = %scope, message = %text, "task notification"),
            None => tracing::trace!(scope = %scope, event = ?event, "internal task event"),
        }
    }
}
