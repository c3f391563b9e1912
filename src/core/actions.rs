//! Immediate actions executed inside `submit`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::handler::HandlerContext;
use crate::core::task::{ActionRequest, CreatorId, ScopeId, TaskId};
use crate::core::SchedulerError;

/// Identifier of the built-in action removing a task's durable record.
pub const REMOVE_TASK_ACTION: &str = "remove_task";

/// Who asked for an action and what they asked for.
#[derive(Debug, Clone)]
pub struct ActionInvocation<'a> {
    /// Submitting scope.
    pub scope_id: &'a ScopeId,
    /// Submitting user or service.
    pub creator_id: &'a CreatorId,
    /// Decoded request.
    pub request: &'a ActionRequest,
}

/// Effect run synchronously by `submit`, bypassing the lanes.
pub trait ImmediateAction: Send + Sync {
    /// Run the effect.
    fn execute(
        &self,
        invocation: &ActionInvocation<'_>,
        ctx: &HandlerContext<'_>,
    ) -> Result<(), SchedulerError>;
}

/// Adapter turning a closure into an [`ImmediateAction`].
pub struct FnAction<F>(pub F);

impl<F> FnAction<F>
where
    F: Fn(&ActionInvocation<'_>, &HandlerContext<'_>) -> Result<(), SchedulerError> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(action: F) -> Self {
        Self(action)
    }
}

impl<F> ImmediateAction for FnAction<F>
where
    F: Fn(&ActionInvocation<'_>, &HandlerContext<'_>) -> Result<(), SchedulerError> + Send + Sync,
{
    fn execute(
        &self,
        invocation: &ActionInvocation<'_>,
        ctx: &HandlerContext<'_>,
    ) -> Result<(), SchedulerError> {
        (self.0)(invocation, ctx)
    }
}

/// Removes the durable record named by `task_id` in the submitting scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveTaskAction;

impl ImmediateAction for RemoveTaskAction {
    fn execute(
        &self,
        invocation: &ActionInvocation<'_>,
        ctx: &HandlerContext<'_>,
    ) -> Result<(), SchedulerError> {
        let raw = invocation
            .request
            .param_str("task_id")
            .ok_or_else(|| SchedulerError::Validation("remove_task requires `task_id`".into()))?;
        let id: TaskId = raw
            .parse()
            .map_err(|e| SchedulerError::Validation(format!("bad task_id `{raw}`: {e}")))?;
        let removed = ctx.remove(invocation.scope_id, id)?;
        tracing::info!(task_id = %id, removed, "remove_task action executed");
        Ok(())
    }
}

/// Table from action identifier to effect.
#[derive(Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn ImmediateAction>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(REMOVE_TASK_ACTION, Arc::new(RemoveTaskAction));
        registry
    }
}

impl ActionRegistry {
    /// Registry holding only the built-in actions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with no actions at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register (or replace) an action.
    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn ImmediateAction>) {
        self.actions.insert(name.into(), action);
    }

    /// Action by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownAction`] for unregistered identifiers.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn ImmediateAction>, SchedulerError> {
        self.actions
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownAction(name.to_string()))
    }

    /// Registered identifiers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
