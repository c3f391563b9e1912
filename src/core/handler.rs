//! Per-kind handler plugins and their registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::notify::TaskEvent;
use crate::core::scheduler::{Scheduler, SubmitReceipt, SubmitRequest};
use crate::core::task::{ScopeId, TaskId, TaskKind, TaskRecord};
use crate::core::SchedulerError;

/// Plugin driving one task kind.
///
/// `start` triggers the external effect and `poll` checks, without blocking,
/// whether it has finished. Both may mutate the record's payload through
/// [`TaskRecord::payload_mut`]; the scheduler persists such changes.
///
/// # Example
///
/// ```rust,ignore
/// use task_lanes::core::{HandlerContext, SchedulerError, TaskHandler, TaskRecord};
///
/// struct GatewayHandler;
///
/// impl TaskHandler for GatewayHandler {
///     fn start(&self, task: &mut TaskRecord, _ctx: &HandlerContext<'_>) -> Result<bool, SchedulerError> {
///         Ok(gateway::trigger(task.id))
///     }
///
///     fn poll(&self, task: &mut TaskRecord, _ctx: &HandlerContext<'_>) -> Result<bool, SchedulerError> {
///         Ok(gateway::is_finished(task.id))
///     }
///
///     fn poll_interval_ticks(&self) -> u64 {
///         5
///     }
/// }
/// ```
pub trait TaskHandler: Send + Sync {
    /// Trigger the external effect.
    ///
    /// Must be safe to call for a task a peer replica already claimed and
    /// return `Ok(false)` in that case rather than an error.
    fn start(&self, task: &mut TaskRecord, ctx: &HandlerContext<'_>) -> Result<bool, SchedulerError>;

    /// Non-blocking completion check.
    fn poll(&self, task: &mut TaskRecord, ctx: &HandlerContext<'_>) -> Result<bool, SchedulerError>;

    /// Ticks between polls.
    fn poll_interval_ticks(&self) -> u64 {
        1
    }
}

/// Static table from task kind to handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `kind`.
    #[must_use]
    pub fn with(mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    /// Register (or replace) the handler for `kind`.
    pub fn register(&mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Handler for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownKind`] when nothing is registered.
    pub fn get(&self, kind: TaskKind) -> Result<&Arc<dyn TaskHandler>, SchedulerError> {
        self.handlers
            .get(&kind)
            .ok_or(SchedulerError::UnknownKind(kind))
    }

    /// Whether a handler is registered for `kind`.
    #[must_use]
    pub fn contains(&self, kind: TaskKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds.
    #[must_use]
    pub fn kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Scheduler services available to handlers and immediate actions.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> HandlerContext<'a> {
    pub(crate) const fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    /// Submit another task through admission.
    ///
    /// # Errors
    ///
    /// Propagates submission errors.
    pub fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, SchedulerError> {
        self.scheduler.submit(request)
    }

    /// Whether a task is still running here or recorded in the store.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn is_tracked(&self, id: TaskId) -> Result<bool, SchedulerError> {
        self.scheduler.is_tracked(id)
    }

    /// Whether the store still holds a record for `id`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn is_recorded(&self, id: TaskId) -> Result<bool, SchedulerError> {
        self.scheduler.store().exists(id)
    }

    /// Whether a scope still exists.
    #[must_use]
    pub fn scope_exists(&self, scope: &ScopeId) -> bool {
        self.scheduler.scope_exists(scope)
    }

    /// Emit an event to a scope.
    pub fn notify(&self, scope: &ScopeId, event: TaskEvent) {
        self.scheduler.notify(scope, event);
    }

    /// Delete a task's durable record.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn remove(&self, scope: &ScopeId, id: TaskId) -> Result<bool, SchedulerError> {
        self.scheduler.remove(scope, id)
    }

    /// Current tick count.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.scheduler.current_tick()
    }
}
