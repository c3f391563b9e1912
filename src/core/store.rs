//! Durable task store abstraction.

use crate::core::task::{StoredTask, TaskId};
use crate::core::SchedulerError;

/// Durable record of every queued or active task.
///
/// Implementations are shared between producers and the poll loop, so every
/// method takes `&self`.
pub trait TaskStore: Send + Sync {
    /// Persist a new record.
    fn create(&self, task: &StoredTask) -> Result<(), SchedulerError>;

    /// Fetch a record by id.
    fn fetch(&self, id: TaskId) -> Result<Option<StoredTask>, SchedulerError>;

    /// Replace a record's payload. Returns false when the record is gone.
    fn update_payload(&self, id: TaskId, payload: serde_json::Value) -> Result<bool, SchedulerError>;

    /// Atomically flip `active` from false to true.
    ///
    /// Returns false when the record is already claimed or no longer exists.
    fn try_claim(&self, id: TaskId) -> Result<bool, SchedulerError>;

    /// Set `active` unconditionally. Returns false when the record is gone.
    fn set_active(&self, id: TaskId, active: bool) -> Result<bool, SchedulerError>;

    /// Delete a record. Returns false when it did not exist.
    fn delete(&self, id: TaskId) -> Result<bool, SchedulerError>;

    /// Every record, in storage order.
    fn list(&self) -> Result<Vec<StoredTask>, SchedulerError>;

    /// Clear every `active` flag; returns how many were set.
    fn clear_active(&self) -> Result<usize, SchedulerError>;

    /// Commit pending mutations.
    fn flush(&self) -> Result<(), SchedulerError>;

    /// Keep the store session alive.
    fn refresh_session(&self) -> Result<(), SchedulerError> {
        Ok(())
    }

    /// Whether a record exists.
    fn exists(&self, id: TaskId) -> Result<bool, SchedulerError> {
        Ok(self.fetch(id)?.is_some())
    }
}
