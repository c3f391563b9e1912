//! Audit trail of task lifecycle transitions.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::task::{Lane, ScopeId, TaskId};
use crate::util::clock::now_ms;

/// Lifecycle transition being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// Record created by `submit`.
    Submit,
    /// Task claimed and started in a lane.
    Start,
    /// Task appended to a wait queue.
    Enqueue,
    /// Start declined on the submission path; task not tracked further.
    Drop,
    /// Poll reported completion.
    Complete,
    /// Durable record removed through the removal API.
    Remove,
    /// Immediate action executed.
    Execute,
    /// Record reloaded during startup recovery.
    Recover,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::Start => "start",
            Self::Enqueue => "enqueue",
            Self::Drop => "drop",
            Self::Complete => "complete",
            Self::Remove => "remove",
            Self::Execute => "execute",
            Self::Recover => "recover",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Related task identifier.
    pub task_id: TaskId,
    /// Owning scope.
    pub scope_id: ScopeId,
    /// Transition recorded.
    pub action: AuditAction,
    /// Lane involved, when the transition concerns one.
    pub lane: Option<Lane>,
    /// Timestamp milliseconds.
    pub created_at_ms: u64,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink keeping the most recent events.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }

    /// Events recorded for one task, oldest first.
    #[must_use]
    pub fn events_for(&self, task_id: TaskId) -> Vec<AuditEvent> {
        self.events
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Shared sink, letting the owner read events the scheduler recorded.
impl<S: AuditSink> AuditSink for Arc<Mutex<S>> {
    fn record(&mut self, event: AuditEvent) {
        self.lock().record(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    task_id: TaskId,
    scope_id: impl Into<ScopeId>,
    action: AuditAction,
    lane: Option<Lane>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        task_id,
        scope_id: scope_id.into(),
        action,
        lane,
        created_at_ms: now_ms(),
        detail,
    }
}
