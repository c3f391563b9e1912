//! Handler for composite tasks expanding into a sequential chain of sub-tasks.
//!
//! Only one sub-task is outstanding at a time. Each poll advances the chain by
//! at most one step:
//! 1. owning scope gone or own record removed: finished, nothing emitted;
//! 2. outstanding sub-task still tracked: not finished;
//! 3. outstanding sub-task no longer tracked: count it, emit progress;
//! 4. nothing outstanding and descriptors left: submit the next one;
//! 5. nothing outstanding and nothing left: emit DONE, finished.

use tracing::{debug, info, warn};

use crate::core::handler::{HandlerContext, TaskHandler};
use crate::core::notify::TaskEvent;
use crate::core::scheduler::SubmitRequest;
use crate::core::task::{CompositeProgress, TaskRecord};
use crate::core::SchedulerError;

/// Drives [`TaskKind::TaskQueue`](crate::core::TaskKind::TaskQueue) tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeHandler;

impl CompositeHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn progress(task: &TaskRecord) -> Result<&CompositeProgress, SchedulerError> {
    task.payload()
        .as_composite()
        .ok_or_else(|| SchedulerError::Handler(format!("task {} has no composite payload", task.id)))
}

fn progress_mut(task: &mut TaskRecord) -> Result<&mut CompositeProgress, SchedulerError> {
    let id = task.id;
    task.payload_mut()
        .as_composite_mut()
        .ok_or_else(|| SchedulerError::Handler(format!("task {id} has no composite payload")))
}

impl TaskHandler for CompositeHandler {
    fn start(&self, task: &mut TaskRecord, ctx: &HandlerContext<'_>) -> Result<bool, SchedulerError> {
        if !ctx.scope_exists(&task.scope_id) {
            debug!(task_id = %task.id, scope = %task.scope_id, "composite start rejected: scope gone");
            return Ok(false);
        }
        let resuming = {
            let state = progress(task)?;
            if state.is_exhausted() {
                debug!(task_id = %task.id, "composite start rejected: nothing to expand");
                return Ok(false);
            }
            state.current.is_some() || state.done_count > 0
        };
        if !resuming {
            let state = progress_mut(task)?;
            state.initial_count = state.pending.len();
            state.done_count = 0;
        }
        Ok(true)
    }

    fn poll(&self, task: &mut TaskRecord, ctx: &HandlerContext<'_>) -> Result<bool, SchedulerError> {
        let id = task.id;
        let scope = task.scope_id.clone();

        if !ctx.scope_exists(&scope) {
            info!(task_id = %id, scope = %scope, "composite orphaned; completing");
            return Ok(true);
        }
        if !ctx.is_recorded(id)? {
            info!(task_id = %id, "composite record removed; completing");
            return Ok(true);
        }

        let (current, next) = {
            let state = progress(task)?;
            (state.current, state.pending.front().cloned())
        };

        if let Some(child) = current {
            if ctx.is_tracked(child)? {
                return Ok(false);
            }
            let state = progress_mut(task)?;
            state.done_count += 1;
            state.current = None;
            ctx.notify(&scope, TaskEvent::Progress {
                task: id,
                fraction: state.fraction(),
            });
            return Ok(false);
        }

        let Some(descriptor) = next else {
            ctx.notify(&scope, TaskEvent::Done { task: id });
            return Ok(true);
        };

        let request = SubmitRequest {
            scope_id: descriptor.scope_id.clone().unwrap_or_else(|| scope.clone()),
            kind: descriptor.kind,
            creator_id: task.creator_id.clone(),
            payload: descriptor.payload.clone(),
            priority: descriptor.resolve_priority(),
        };
        match ctx.submit(request) {
            Ok(receipt) => {
                let state = progress_mut(task)?;
                state.pending.pop_front();
                state.current = Some(receipt.id);
                debug!(task_id = %id, child = %receipt.id, kind = %descriptor.kind, "sub-task submitted");
                ctx.notify(&scope, TaskEvent::SubTaskStarted {
                    task: id,
                    child: receipt.id,
                });
                Ok(false)
            }
            Err(e) if e.is_submission_error() => {
                warn!(task_id = %id, kind = %descriptor.kind, error = %e, "sub-task rejected; skipping");
                let state = progress_mut(task)?;
                state.pending.pop_front();
                state.done_count += 1;
                ctx.notify(&scope, TaskEvent::Progress {
                    task: id,
                    fraction: state.fraction(),
                });
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
