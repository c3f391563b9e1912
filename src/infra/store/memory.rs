//! In-memory task store.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::task::{StoredTask, TaskId};
use crate::core::{SchedulerError, TaskStore};

/// Records keyed by id, iterated in insertion order.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    next_seq: u64,
    order: BTreeMap<u64, TaskId>,
    records: HashMap<TaskId, (u64, StoredTask)>,
}

impl StoreState {
    /// Insert or replace a record; a replaced record keeps its position.
    pub(crate) fn upsert(&mut self, task: StoredTask) {
        if let Some((_, existing)) = self.records.get_mut(&task.id) {
            *existing = task;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, task.id);
        self.records.insert(task.id, (seq, task));
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&StoredTask> {
        self.records.get(&id).map(|(_, task)| task)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut StoredTask> {
        self.records.get_mut(&id).map(|(_, task)| task)
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> bool {
        match self.records.remove(&id) {
            Some((seq, _)) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    pub(crate) fn list(&self) -> Vec<StoredTask> {
        self.order
            .values()
            .filter_map(|id| self.get(*id).cloned())
            .collect()
    }

    pub(crate) fn clear_active(&mut self) -> usize {
        let mut cleared = 0;
        for (_, task) in self.records.values_mut() {
            if task.active {
                task.active = false;
                cleared += 1;
            }
        }
        cleared
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Volatile store for development, tests and single-process deployments
/// that accept losing the backlog on restart.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    flushes: Mutex<usize>,
    refreshes: Mutex<usize>,
}

impl InMemoryTaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Times `flush` was called.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }

    /// Times `refresh_session` was called.
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        *self.refreshes.lock()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create(&self, task: &StoredTask) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.get(task.id).is_some() {
            return Err(SchedulerError::Store(format!("task {} already exists", task.id)));
        }
        state.upsert(task.clone());
        Ok(())
    }

    fn fetch(&self, id: TaskId) -> Result<Option<StoredTask>, SchedulerError> {
        Ok(self.state.lock().get(id).cloned())
    }

    fn update_payload(&self, id: TaskId, payload: Value) -> Result<bool, SchedulerError> {
        Ok(self.state.lock().get_mut(id).map(|task| task.payload = payload).is_some())
    }

    fn try_claim(&self, id: TaskId) -> Result<bool, SchedulerError> {
        let mut state = self.state.lock();
        match state.get_mut(id) {
            Some(task) if !task.active => {
                task.active = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_active(&self, id: TaskId, active: bool) -> Result<bool, SchedulerError> {
        Ok(self.state.lock().get_mut(id).map(|task| task.active = active).is_some())
    }

    fn delete(&self, id: TaskId) -> Result<bool, SchedulerError> {
        Ok(self.state.lock().remove(id))
    }

    fn list(&self) -> Result<Vec<StoredTask>, SchedulerError> {
        Ok(self.state.lock().list())
    }

    fn clear_active(&self) -> Result<usize, SchedulerError> {
        Ok(self.state.lock().clear_active())
    }

    fn flush(&self) -> Result<(), SchedulerError> {
        *self.flushes.lock() += 1;
        Ok(())
    }

    fn refresh_session(&self) -> Result<(), SchedulerError> {
        *self.refreshes.lock() += 1;
        Ok(())
    }
}
