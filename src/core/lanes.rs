//! Per-lane wait queues and bounded active sets.
//!
//! Each lane owns two independently locked containers. Capacity is claimed in
//! two phases, mirroring a reserve-then-run admission: a slot is reserved
//! under the active-set lock, the start operation runs with no lock held, and
//! the reservation is then either committed into an entry or released.
//!
//! Lock order across the scheduler is priority active set, then normal active
//! set, then any wait queue. Wait-queue locks are never held while acquiring
//! another lock.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::{Lane, TaskId, TaskKind, TaskRecord};

/// A task occupying an active slot.
#[derive(Debug)]
pub struct ActiveTask {
    /// Task identifier.
    pub id: TaskId,
    /// Task kind, fixed for the task's lifetime.
    pub kind: TaskKind,
    /// Lane whose slot the task occupies (may differ from its declared lane).
    pub lane: Lane,
    /// Tick at which the task was admitted.
    pub admitted_tick: u64,
    /// The record, locked while its handler runs.
    pub record: Mutex<TaskRecord>,
}

impl ActiveTask {
    /// Wrap a started record.
    #[must_use]
    pub fn new(record: TaskRecord, lane: Lane, admitted_tick: u64) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            lane,
            admitted_tick,
            record: Mutex::new(record),
        }
    }

    /// Ticks elapsed since admission.
    #[must_use]
    pub const fn elapsed(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.admitted_tick)
    }
}

/// Bounded, insertion-ordered set of running tasks.
#[derive(Debug)]
pub struct ActiveSet {
    ceiling: usize,
    reserved: usize,
    entries: Vec<Arc<ActiveTask>>,
}

impl ActiveSet {
    /// Create an empty set with the given ceiling.
    #[must_use]
    pub const fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            reserved: 0,
            entries: Vec::new(),
        }
    }

    /// Configured ceiling.
    #[must_use]
    pub const fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Entries plus outstanding reservations.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.entries.len() + self.reserved
    }

    /// Whether a slot can be reserved.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.occupied() < self.ceiling
    }

    /// Reserve a slot; false when the set is full.
    pub fn try_reserve(&mut self) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.reserved += 1;
        true
    }

    /// Give back a reservation that did not turn into a running task.
    pub fn release(&mut self) {
        debug_assert!(self.reserved > 0, "release without reservation");
        self.reserved = self.reserved.saturating_sub(1);
    }

    /// Turn a reservation into a running entry.
    pub fn commit(&mut self, task: Arc<ActiveTask>) {
        debug_assert!(self.reserved > 0, "commit without reservation");
        self.reserved = self.reserved.saturating_sub(1);
        self.entries.push(task);
    }

    /// Remove a running entry.
    pub fn remove(&mut self, id: TaskId) -> Option<Arc<ActiveTask>> {
        let index = self.entries.iter().position(|t| t.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Whether a task is running here.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.entries.iter().any(|t| t.id == id)
    }

    /// Running entries in admission order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<ActiveTask>> {
        self.entries.clone()
    }

    /// Running task ids in admission order.
    #[must_use]
    pub fn ids(&self) -> Vec<TaskId> {
        self.entries.iter().map(|t| t.id).collect()
    }

    /// Number of running entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// FIFO backlog of records waiting for a slot.
#[derive(Debug, Default)]
pub struct WaitQueue {
    tasks: VecDeque<TaskRecord>,
}

impl WaitQueue {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Append a record; returns its 1-based position.
    pub fn push(&mut self, record: TaskRecord) -> usize {
        self.tasks.push_back(record);
        self.tasks.len()
    }

    /// Put a record back at the head of the queue.
    pub fn push_front(&mut self, record: TaskRecord) {
        self.tasks.push_front(record);
    }

    /// Take the oldest record.
    pub fn pop(&mut self) -> Option<TaskRecord> {
        self.tasks.pop_front()
    }

    /// Drop a waiting record by id.
    pub fn remove(&mut self, id: TaskId) -> Option<TaskRecord> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        self.tasks.remove(index)
    }

    /// 1-based position of a waiting record.
    #[must_use]
    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id).map(|i| i + 1)
    }

    /// Waiting ids in FIFO order.
    #[must_use]
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }

    /// Queue depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Active set and wait queue of one lane.
#[derive(Debug)]
pub struct LanePool {
    /// Which lane this is.
    pub lane: Lane,
    /// Running tasks.
    pub active: Mutex<ActiveSet>,
    /// Backlog.
    pub waiting: Mutex<WaitQueue>,
}

impl LanePool {
    /// Create an empty lane with a concurrency ceiling.
    #[must_use]
    pub fn new(lane: Lane, ceiling: usize) -> Self {
        Self {
            lane,
            active: Mutex::new(ActiveSet::new(ceiling)),
            waiting: Mutex::new(WaitQueue::new()),
        }
    }

    /// Point-in-time view of the lane.
    #[must_use]
    pub fn snapshot(&self) -> LaneSnapshot {
        let (max_active, active) = {
            let set = self.active.lock();
            (set.ceiling(), set.ids())
        };
        let waiting = self.waiting.lock().ids();
        LaneSnapshot {
            lane: self.lane,
            max_active,
            active,
            waiting,
        }
    }
}

/// Serializable view of a lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneSnapshot {
    /// Lane.
    pub lane: Lane,
    /// Concurrency ceiling.
    pub max_active: usize,
    /// Running task ids in admission order.
    pub active: Vec<TaskId>,
    /// Waiting task ids in FIFO order.
    pub waiting: Vec<TaskId>,
}
