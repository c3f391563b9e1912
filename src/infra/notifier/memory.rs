//! In-memory notification inbox.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::core::notify::{Notifier, TaskEvent};
use crate::core::task::ScopeId;
use crate::util::clock::now_ms;

/// Delivered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    /// Structured event.
    pub event: TaskEvent,
    /// Wire text, e.g. `task:<id>:state:DONE`. `None` for internal events.
    pub text: Option<String>,
    /// Timestamp milliseconds.
    pub created_at_ms: u64,
}

/// Per-scope inbox for development/testing.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    messages: Mutex<HashMap<ScopeId, Vec<NotificationMessage>>>,
}

impl InMemoryNotifier {
    /// Create an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch messages for a scope, optionally since a timestamp.
    #[must_use]
    pub fn fetch(&self, scope: &str, since_ms: Option<u64>, limit: usize) -> Vec<NotificationMessage> {
        self.messages
            .lock()
            .get(scope)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| since_ms.is_none_or(|s| m.created_at_ms >= s))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every event delivered to a scope, oldest first.
    #[must_use]
    pub fn events(&self, scope: &str) -> Vec<TaskEvent> {
        self.fetch(scope, None, usize::MAX)
            .into_iter()
            .map(|m| m.event)
            .collect()
    }

    /// Wire texts delivered to a scope, oldest first.
    #[must_use]
    pub fn texts(&self, scope: &str) -> Vec<String> {
        self.fetch(scope, None, usize::MAX)
            .into_iter()
            .filter_map(|m| m.text)
            .collect()
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, scope: &ScopeId, event: TaskEvent) {
        let message = NotificationMessage {
            text: event.wire_text(),
            event,
            created_at_ms: now_ms(),
        };
        self.messages
            .lock()
            .entry(scope.clone())
            .or_default()
            .push(message);
    }
}
