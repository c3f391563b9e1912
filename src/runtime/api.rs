//! API-facing request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{
    Admission, Lane, LaneSnapshot, Scheduler, ScopeId, SubmitReceipt, SubmitRequest, TaskId,
};

/// Response to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// `0` when running, 1-based position when waiting, absent otherwise.
    pub queue_position: Option<usize>,
    /// Placement decision.
    pub admission: Admission,
}

impl From<SubmitReceipt> for SubmissionResponse {
    fn from(receipt: SubmitReceipt) -> Self {
        Self {
            task_id: receipt.id,
            queue_position: receipt.queue_position(),
            admission: receipt.admission,
        }
    }
}

/// Removal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalRequest {
    /// Scope the task must belong to.
    pub scope_id: ScopeId,
    /// Task to remove.
    pub task_id: TaskId,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Ticks run so far.
    pub tick: u64,
}

/// Submit a task; errors are rendered for the transport layer.
///
/// # Errors
///
/// Returns the scheduler error's message.
pub fn submit_task(scheduler: &Scheduler, req: SubmitRequest) -> Result<SubmissionResponse, String> {
    scheduler
        .submit(req)
        .map(SubmissionResponse::from)
        .map_err(|e| e.to_string())
}

/// Remove a task's durable record.
///
/// # Errors
///
/// Returns the scheduler error's message.
pub fn remove_task(scheduler: &Scheduler, req: &RemovalRequest) -> Result<bool, String> {
    scheduler
        .remove(&req.scope_id, req.task_id)
        .map_err(|e| e.to_string())
}

/// Both lanes, priority first.
#[must_use]
pub fn lane_snapshots(scheduler: &Scheduler) -> Vec<LaneSnapshot> {
    vec![scheduler.snapshot(Lane::Priority), scheduler.snapshot(Lane::Normal)]
}

/// Liveness summary.
#[must_use]
pub fn health(scheduler: &Scheduler) -> Health {
    Health {
        ok: true,
        tick: scheduler.current_tick(),
    }
}
