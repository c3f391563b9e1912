//! Shared fixtures: a scriptable handler and a fully wired scheduler.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use task_lanes::builders::SchedulerBuilder;
use task_lanes::config::{LaneConfig, SchedulerConfig};
use task_lanes::core::{
    HandlerContext, InMemoryAuditSink, Scheduler, SchedulerError, SubmitReceipt, SubmitRequest,
    TaskHandler, TaskId, TaskKind, TaskRecord,
};
use task_lanes::infra::{InMemoryNotifier, InMemoryScopeDirectory, InMemoryTaskStore};

/// Scopes registered by [`harness`].
pub const SCOPES: [&str; 2] = ["p1", "p2"];

/// Kinds driven by [`ScriptedHandler`] in [`harness`].
pub const QUEUED_KINDS: [TaskKind; 6] = [
    TaskKind::Tokenization,
    TaskKind::AttributeCalculation,
    TaskKind::Embedding,
    TaskKind::InformationSource,
    TaskKind::Gateway,
    TaskKind::FileOperation,
];

/// Handler whose outcomes are set by the test.
#[derive(Default)]
pub struct ScriptedHandler {
    interval: u64,
    started: Mutex<Vec<TaskId>>,
    polled: Mutex<Vec<TaskId>>,
    finished: Mutex<HashSet<TaskId>>,
    poll_faults: Mutex<HashSet<TaskId>>,
    decline_next: AtomicUsize,
    fault_next: AtomicUsize,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::with_interval(1)
    }

    pub fn with_interval(interval: u64) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Make the next `n` starts report not-started.
    pub fn decline_next(&self, n: usize) {
        self.decline_next.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` starts raise a fault.
    pub fn fault_next_start(&self, n: usize) {
        self.fault_next.store(n, Ordering::SeqCst);
    }

    /// Report `id` finished on its next poll.
    pub fn finish(&self, id: TaskId) {
        self.finished.lock().insert(id);
    }

    /// Make polls of `id` raise a fault.
    pub fn fault_on_poll(&self, id: TaskId) {
        self.poll_faults.lock().insert(id);
    }

    pub fn clear_faults(&self) {
        self.poll_faults.lock().clear();
    }

    pub fn started(&self) -> Vec<TaskId> {
        self.started.lock().clone()
    }

    pub fn polled(&self) -> Vec<TaskId> {
        self.polled.lock().clone()
    }

    pub fn clear_polled(&self) {
        self.polled.lock().clear();
    }
}

impl TaskHandler for ScriptedHandler {
    fn start(&self, task: &mut TaskRecord, _ctx: &HandlerContext<'_>) -> Result<bool, SchedulerError> {
        let faulted = self
            .fault_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if faulted {
            return Err(SchedulerError::Handler(format!("start of {} failed", task.id)));
        }
        let declined = self
            .decline_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if declined {
            return Ok(false);
        }
        self.started.lock().push(task.id);
        Ok(true)
    }

    fn poll(&self, task: &mut TaskRecord, _ctx: &HandlerContext<'_>) -> Result<bool, SchedulerError> {
        self.polled.lock().push(task.id);
        if self.poll_faults.lock().contains(&task.id) {
            return Err(SchedulerError::Handler(format!("poll of {} exploded", task.id)));
        }
        Ok(self.finished.lock().contains(&task.id))
    }

    fn poll_interval_ticks(&self) -> u64 {
        self.interval
    }
}

/// Scheduler wired to in-memory collaborators the test can inspect.
pub struct Harness {
    pub scheduler: Arc<Scheduler>,
    pub handler: Arc<ScriptedHandler>,
    pub store: Arc<InMemoryTaskStore>,
    pub notifier: Arc<InMemoryNotifier>,
    pub scopes: Arc<InMemoryScopeDirectory>,
    pub audit: Arc<Mutex<InMemoryAuditSink>>,
}

pub fn harness(priority_max: usize, normal_max: usize) -> Harness {
    harness_with(priority_max, normal_max, Arc::new(ScriptedHandler::new()), Arc::new(InMemoryTaskStore::new()))
}

pub fn harness_with(
    priority_max: usize,
    normal_max: usize,
    handler: Arc<ScriptedHandler>,
    store: Arc<InMemoryTaskStore>,
) -> Harness {
    let config = SchedulerConfig {
        priority: LaneConfig::new(priority_max),
        normal: LaneConfig::new(normal_max),
        ..SchedulerConfig::default()
    };
    let notifier = Arc::new(InMemoryNotifier::new());
    let scopes = Arc::new(InMemoryScopeDirectory::with_scopes(SCOPES));
    let audit = Arc::new(Mutex::new(InMemoryAuditSink::new(1024)));

    let mut builder = SchedulerBuilder::new(config)
        .store(Arc::clone(&store) as _)
        .notifier(Arc::clone(&notifier) as _)
        .scopes(Arc::clone(&scopes) as _)
        .audit(Box::new(Arc::clone(&audit)));
    for kind in QUEUED_KINDS {
        builder = builder.handler(kind, Arc::clone(&handler) as _);
    }

    Harness {
        scheduler: builder.build().expect("scheduler builds"),
        handler,
        store,
        notifier,
        scopes,
        audit,
    }
}

impl Harness {
    pub fn submit(&self, kind: TaskKind, priority: bool) -> SubmitReceipt {
        self.submit_in("p1", kind, priority)
    }

    pub fn submit_in(&self, scope: &str, kind: TaskKind, priority: bool) -> SubmitReceipt {
        self.scheduler
            .submit(SubmitRequest::new(scope, "tester", kind, serde_json::json!({})).with_priority(priority))
            .expect("submission accepted")
    }
}
