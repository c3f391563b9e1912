//! Two-lane admission controller with completion polling.
//!
//! Producers call [`Scheduler::submit`] from any thread. A single
//! reconciliation process calls [`Scheduler::tick`] once per tick; it polls
//! running tasks through their handlers, removes finished ones and refills the
//! freed slots from the wait queues.
//!
//! Lane rules:
//! - a task runs on its declared lane when that lane has a free slot;
//! - a priority task may borrow a free normal slot, never the reverse;
//! - otherwise it waits in its own lane's FIFO queue;
//! - a freed priority slot pulls only from the priority queue, a freed normal
//!   slot pulls from the normal queue and then from the priority queue.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::core::actions::{ActionInvocation, ActionRegistry};
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::composite::CompositeHandler;
use crate::core::handler::{HandlerContext, HandlerRegistry, TaskHandler};
use crate::core::lanes::{ActiveTask, LanePool, LaneSnapshot};
use crate::core::notify::{Notifier, TaskEvent, TracingNotifier};
use crate::core::scope::{AllScopes, ScopeDirectory};
use crate::core::store::TaskStore;
use crate::core::task::{
    ActionRequest, CreatorId, KindClass, Lane, ScopeId, TaskId, TaskKind, TaskPayload, TaskRecord,
};
use crate::core::SchedulerError;

/// Configuration values for capacity enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerLimits {
    /// Ceiling of the priority lane.
    pub priority_max: usize,
    /// Ceiling of the normal lane.
    pub normal_max: usize,
    /// Ticks between store session refreshes.
    pub session_refresh_ticks: u64,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            priority_max: 2,
            normal_max: 4,
            session_refresh_ticks: 120,
        }
    }
}

/// Producer-side submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Owning scope.
    pub scope_id: ScopeId,
    /// Task kind.
    pub kind: TaskKind,
    /// Submitting user or service.
    pub creator_id: CreatorId,
    /// Kind-specific payload.
    #[serde(default)]
    pub payload: Value,
    /// Request the priority lane.
    #[serde(default)]
    pub priority: bool,
}

impl SubmitRequest {
    /// Normal-lane submission.
    pub fn new(
        scope_id: impl Into<ScopeId>,
        creator_id: impl Into<CreatorId>,
        kind: TaskKind,
        payload: Value,
    ) -> Self {
        Self {
            scope_id: scope_id.into(),
            kind,
            creator_id: creator_id.into(),
            payload,
            priority: false,
        }
    }

    /// Set the priority flag.
    #[must_use]
    pub const fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }
}

/// Where a submission ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Admission {
    /// Claimed and running in `lane`.
    Started {
        /// Lane whose slot the task occupies.
        lane: Lane,
    },
    /// Waiting in `lane`'s queue at 1-based `position`.
    Queued {
        /// Lane whose queue holds the task.
        lane: Lane,
        /// Position at enqueue time.
        position: usize,
    },
    /// Start declined; the task is not tracked by this process.
    Dropped,
    /// Immediate action already executed.
    Executed,
}

/// Result of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Handle of the task.
    pub id: TaskId,
    /// Placement decision.
    pub admission: Admission,
}

impl SubmitReceipt {
    /// Queue position: `Some(0)` when running, the 1-based position when
    /// waiting, `None` otherwise.
    #[must_use]
    pub const fn queue_position(&self) -> Option<usize> {
        match self.admission {
            Admission::Started { .. } => Some(0),
            Admission::Queued { position, .. } => Some(position),
            Admission::Dropped | Admission::Executed => None,
        }
    }
}

/// Outcome of one reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Tasks that reported completion.
    pub completed: usize,
    /// Fault that aborted reconciliation, if any.
    pub fault: Option<String>,
}

/// Outcome of startup recovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Durable claims force-cleared.
    pub cleared_claims: usize,
    /// Records re-admitted.
    pub reloaded: usize,
    /// Re-admitted records now running.
    pub started: usize,
    /// Re-admitted records now waiting.
    pub queued: usize,
    /// Re-admitted records whose start was declined.
    pub dropped: usize,
    /// Records that could not be re-admitted.
    pub skipped: usize,
}

enum StartOutcome {
    Started,
    Declined,
    Faulted(SchedulerError, TaskRecord),
}

type SharedAudit = Arc<Mutex<Box<dyn AuditSink>>>;

/// The task scheduler.
///
/// Owned by the process's composition root and shared by reference (usually
/// through an `Arc`) with every producer and with the poll loop.
pub struct Scheduler {
    limits: SchedulerLimits,
    priority: LanePool,
    normal: LanePool,
    handlers: HandlerRegistry,
    actions: ActionRegistry,
    store: Arc<dyn TaskStore>,
    scopes: Arc<dyn ScopeDirectory>,
    notifier: Arc<dyn Notifier>,
    audit: Option<SharedAudit>,
    ticks: AtomicU64,
    tick_lock: Mutex<()>,
}

impl Scheduler {
    /// Create a scheduler from components.
    ///
    /// The composite handler is registered for [`TaskKind::TaskQueue`] unless
    /// `handlers` already provides one.
    pub fn new(limits: SchedulerLimits, mut handlers: HandlerRegistry, store: Arc<dyn TaskStore>) -> Self {
        if !handlers.contains(TaskKind::TaskQueue) {
            handlers.register(TaskKind::TaskQueue, Arc::new(CompositeHandler::new()));
        }
        Self {
            priority: LanePool::new(Lane::Priority, limits.priority_max),
            normal: LanePool::new(Lane::Normal, limits.normal_max),
            limits,
            handlers,
            actions: ActionRegistry::new(),
            store,
            scopes: Arc::new(AllScopes),
            notifier: Arc::new(TracingNotifier),
            audit: None,
            ticks: AtomicU64::new(0),
            tick_lock: Mutex::new(()),
        }
    }

    /// Replace the immediate-action table.
    #[must_use]
    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Attach a scope directory for orphan detection.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Arc<dyn ScopeDirectory>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Attach a notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Configured limits.
    #[must_use]
    pub const fn limits(&self) -> &SchedulerLimits {
        &self.limits
    }

    /// Registered handlers.
    #[must_use]
    pub const fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// The durable store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Ticks run so far.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Point-in-time view of a lane.
    #[must_use]
    pub fn snapshot(&self, lane: Lane) -> LaneSnapshot {
        self.pool(lane).snapshot()
    }

    /// Whether a scope still exists.
    #[must_use]
    pub fn scope_exists(&self, scope: &ScopeId) -> bool {
        self.scopes.scope_exists(scope)
    }

    /// Emit an event to a scope.
    pub fn notify(&self, scope: &ScopeId, event: TaskEvent) {
        self.notifier.notify(scope, event);
    }

    /// Whether a task is running in this process or still recorded durably.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn is_tracked(&self, id: TaskId) -> Result<bool, SchedulerError> {
        if self.priority.active.lock().contains(id) || self.normal.active.lock().contains(id) {
            return Ok(true);
        }
        self.store.exists(id)
    }

    /// Submit a task.
    ///
    /// Immediate actions run before this returns and never enter a lane.
    /// Other kinds are recorded durably and admitted to a lane; when the
    /// start operation declines a task on this path the task is dropped from
    /// consideration rather than queued (its durable record is kept).
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::Validation`] for malformed payloads
    /// - [`SchedulerError::UnknownKind`] when no handler is registered
    /// - [`SchedulerError::UnknownAction`] for unregistered immediate actions
    /// - store and handler errors raised while recording or starting the task
    pub fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, SchedulerError> {
        let SubmitRequest {
            scope_id,
            kind,
            creator_id,
            payload,
            priority,
        } = request;

        if kind.class() == KindClass::Immediate {
            return self.execute_action(&scope_id, &creator_id, payload);
        }

        self.handlers.get(kind)?;
        let payload = TaskPayload::from_submission(kind, payload)?;
        let record = TaskRecord::new(scope_id, creator_id, kind, payload, priority);
        self.store.create(&record.to_stored()?)?;
        self.store.flush()?;
        debug!(task_id = %record.id, kind = %kind, priority, "task recorded");
        self.record_audit(record.id, &record.scope_id, AuditAction::Submit, None, None);

        let id = record.id;
        let admission = self.admit(record)?;
        Ok(SubmitReceipt { id, admission })
    }

    /// Delete a task's durable record.
    ///
    /// In-memory handlers are not signalled: a running task keeps being
    /// polled, and a waiting task is discarded when its claim fails.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn remove(&self, scope: &ScopeId, id: TaskId) -> Result<bool, SchedulerError> {
        let Some(stored) = self.store.fetch(id)? else {
            return Ok(false);
        };
        if &stored.scope_id != scope {
            warn!(task_id = %id, scope = %scope, "remove refused: task belongs to another scope");
            return Ok(false);
        }
        let removed = self.store.delete(id)?;
        self.store.flush()?;
        if removed {
            info!(task_id = %id, "task record removed");
            self.record_audit(id, scope, AuditAction::Remove, None, None);
        }
        Ok(removed)
    }

    /// Startup recovery: clear every durable claim, then re-admit every
    /// surviving record in storage order.
    ///
    /// Call once on a freshly built scheduler before starting the poll loop.
    ///
    /// # Errors
    ///
    /// Propagates store errors from clearing or listing records.
    pub fn recover(&self) -> Result<RecoveryReport, SchedulerError> {
        let mut report = RecoveryReport {
            cleared_claims: self.store.clear_active()?,
            ..RecoveryReport::default()
        };
        self.store.flush()?;

        for stored in self.store.list()? {
            let id = stored.id;
            let record = match TaskRecord::try_from(stored) {
                Ok(record) => record,
                Err(e) => {
                    warn!(task_id = %id, error = %e, "skipping undecodable record");
                    report.skipped += 1;
                    continue;
                }
            };
            if !self.handlers.contains(record.kind) {
                warn!(task_id = %id, kind = %record.kind, "skipping record without handler");
                report.skipped += 1;
                continue;
            }
            self.record_audit(id, &record.scope_id, AuditAction::Recover, None, None);
            match self.admit(record) {
                Ok(Admission::Started { .. }) => report.started += 1,
                Ok(Admission::Queued { .. }) => report.queued += 1,
                Ok(Admission::Dropped | Admission::Executed) => report.dropped += 1,
                Err(e) => {
                    warn!(task_id = %id, error = %e, "re-admission failed");
                    report.skipped += 1;
                    continue;
                }
            }
            report.reloaded += 1;
        }

        info!(
            cleared = report.cleared_claims,
            reloaded = report.reloaded,
            started = report.started,
            queued = report.queued,
            skipped = report.skipped,
            "task backlog recovered"
        );
        Ok(report)
    }

    /// Run one reconciliation tick.
    ///
    /// The priority lane is reconciled before the normal lane, inside a
    /// single failure boundary: a fault aborts both lanes for this tick and
    /// the remaining tasks are polled again on the next one. Slots freed
    /// without a successful refill, for example after a start fault, are
    /// backfilled from the wait queues at the start of the next tick.
    pub fn tick(&self) -> TickReport {
        let _serial = self.tick_lock.lock();
        let tick = self.ticks.fetch_add(1, Ordering::AcqRel) + 1;

        if tick % self.limits.session_refresh_ticks.max(1) == 0 {
            if let Err(e) = self.store.refresh_session() {
                warn!(tick, error = %e, "store session refresh failed");
            }
        }

        let backfill = self.backfill();
        if let Ok(started) = &backfill {
            if *started > 0 {
                debug!(tick, started, "backlog started on free slots");
            }
        }

        let mut completed = 0;
        let outcome = self
            .reconcile(Lane::Priority, tick, &mut completed)
            .and_then(|()| self.reconcile(Lane::Normal, tick, &mut completed));
        let fault = match backfill.and(outcome) {
            Ok(()) => None,
            Err(e) => {
                error!(tick, error = %e, "reconciliation aborted for this tick");
                Some(e.to_string())
            }
        };

        if completed > 0 {
            if let Err(e) = self.store.flush() {
                error!(tick, error = %e, "flush after completions failed");
            }
        }

        TickReport {
            tick,
            completed,
            fault,
        }
    }

    fn pool(&self, lane: Lane) -> &LanePool {
        match lane {
            Lane::Priority => &self.priority,
            Lane::Normal => &self.normal,
        }
    }

    const fn context(&self) -> HandlerContext<'_> {
        HandlerContext::new(self)
    }

    fn execute_action(
        &self,
        scope_id: &ScopeId,
        creator_id: &CreatorId,
        payload: Value,
    ) -> Result<SubmitReceipt, SchedulerError> {
        let request = ActionRequest::from_value(payload)?;
        let action = self.actions.get(&request.action)?;
        let invocation = ActionInvocation {
            scope_id,
            creator_id,
            request: &request,
        };
        action.execute(&invocation, &self.context())?;

        let id = uuid::Uuid::new_v4();
        info!(action = %request.action, scope = %scope_id, "immediate action executed");
        self.record_audit(
            id,
            scope_id,
            AuditAction::Execute,
            None,
            Some(request.action.clone()),
        );
        Ok(SubmitReceipt {
            id,
            admission: Admission::Executed,
        })
    }

    fn admit(&self, record: TaskRecord) -> Result<Admission, SchedulerError> {
        let declared = record.lane();
        let id = record.id;
        let scope = record.scope_id.clone();
        let own = self.pool(declared);

        let mut own_active = own.active.lock();
        let slot = if own_active.try_reserve() {
            Some(declared)
        } else if declared == Lane::Priority && self.normal.active.lock().try_reserve() {
            Some(Lane::Normal)
        } else {
            None
        };

        let Some(lane) = slot else {
            let position = own.waiting.lock().push(record);
            drop(own_active);
            debug!(task_id = %id, lane = %declared, position, "task queued");
            self.record_audit(id, &scope, AuditAction::Enqueue, Some(declared), None);
            return Ok(Admission::Queued {
                lane: declared,
                position,
            });
        };
        drop(own_active);

        match self.try_start(record, lane) {
            StartOutcome::Started => Ok(Admission::Started { lane }),
            StartOutcome::Declined => {
                warn!(task_id = %id, lane = %lane, "start declined on submission; task dropped");
                self.record_audit(id, &scope, AuditAction::Drop, Some(lane), None);
                Ok(Admission::Dropped)
            }
            StartOutcome::Faulted(e, _) => Err(e),
        }
    }

    /// Start a task on a slot already reserved in `lane`.
    fn try_start(&self, mut record: TaskRecord, lane: Lane) -> StartOutcome {
        let id = record.id;
        match self.store.try_claim(id) {
            Ok(true) => {}
            Ok(false) => {
                self.pool(lane).active.lock().release();
                debug!(task_id = %id, "claim conflict or record gone");
                return StartOutcome::Declined;
            }
            Err(e) => {
                self.pool(lane).active.lock().release();
                return StartOutcome::Faulted(e, record);
            }
        }

        let started = self.handlers.get(record.kind).and_then(|handler| {
            let ctx = self.context();
            guarded(record.kind, "start", || handler.start(&mut record, &ctx))
        });
        let started = started.and_then(|ok| {
            if ok && record.take_dirty() {
                self.store.update_payload(id, record.payload().to_value()?)?;
            }
            Ok(ok)
        });

        match started {
            Ok(true) => {
                record.active = true;
                let scope = record.scope_id.clone();
                let task = Arc::new(ActiveTask::new(record, lane, self.current_tick()));
                self.pool(lane).active.lock().commit(task);
                info!(task_id = %id, lane = %lane, "task started");
                self.record_audit(id, &scope, AuditAction::Start, Some(lane), None);
                StartOutcome::Started
            }
            Ok(false) => {
                self.unclaim(id);
                self.pool(lane).active.lock().release();
                StartOutcome::Declined
            }
            Err(e) => {
                self.unclaim(id);
                self.pool(lane).active.lock().release();
                StartOutcome::Faulted(e, record)
            }
        }
    }

    fn unclaim(&self, id: TaskId) {
        if let Err(e) = self.store.set_active(id, false) {
            warn!(task_id = %id, error = %e, "failed to release claim");
        }
    }

    fn reconcile(&self, lane: Lane, tick: u64, completed: &mut usize) -> Result<(), SchedulerError> {
        let running = self.pool(lane).active.lock().snapshot();
        for task in running {
            let handler = self.handlers.get(task.kind)?;
            let interval = handler.poll_interval_ticks().max(1);
            if task.elapsed(tick) % interval != 0 {
                continue;
            }
            if self.poll_task(handler.as_ref(), &task)? {
                self.complete(&task)?;
                *completed += 1;
                if let Some(next) = self.refill(task.lane)? {
                    debug!(task_id = %next, lane = %task.lane, "freed slot refilled");
                }
            }
        }
        Ok(())
    }

    fn poll_task(&self, handler: &dyn TaskHandler, task: &ActiveTask) -> Result<bool, SchedulerError> {
        let mut record = task.record.lock();
        let ctx = self.context();
        let finished = guarded(task.kind, "poll", || handler.poll(&mut record, &ctx))?;
        if !finished && record.take_dirty() {
            self.store.update_payload(task.id, record.payload().to_value()?)?;
        }
        Ok(finished)
    }

    fn complete(&self, task: &ActiveTask) -> Result<(), SchedulerError> {
        self.pool(task.lane).active.lock().remove(task.id);
        let scope = task.record.lock().scope_id.clone();
        self.store.delete(task.id)?;
        info!(task_id = %task.id, lane = %task.lane, "task completed");
        self.record_audit(task.id, &scope, AuditAction::Complete, Some(task.lane), None);
        Ok(())
    }

    /// Start waiting tasks on every slot left free by an earlier tick, priority
    /// lane first. Returns how many tasks started.
    fn backfill(&self) -> Result<usize, SchedulerError> {
        let mut started = 0;
        for lane in [Lane::Priority, Lane::Normal] {
            while self.refill(lane)?.is_some() {
                started += 1;
            }
        }
        Ok(started)
    }

    /// Fill one free slot of `lane`, discarding candidates whose start is
    /// declined until one starts or the eligible queues are empty.
    fn refill(&self, lane: Lane) -> Result<Option<TaskId>, SchedulerError> {
        loop {
            let (candidate, origin) = {
                let mut active = self.pool(lane).active.lock();
                if !active.try_reserve() {
                    return Ok(None);
                }
                let Some(found) = self.next_candidate(lane) else {
                    active.release();
                    return Ok(None);
                };
                found
            };

            let id = candidate.id;
            let scope = candidate.scope_id.clone();
            match self.try_start(candidate, lane) {
                StartOutcome::Started => return Ok(Some(id)),
                StartOutcome::Declined => {
                    debug!(task_id = %id, "refill candidate declined; trying next");
                    self.record_audit(id, &scope, AuditAction::Drop, Some(lane), None);
                }
                StartOutcome::Faulted(e, record) => {
                    self.pool(origin).waiting.lock().push_front(record);
                    return Err(e);
                }
            }
        }
    }

    /// Next waiting record eligible for a slot in `lane`, with the queue it came from.
    fn next_candidate(&self, lane: Lane) -> Option<(TaskRecord, Lane)> {
        let own = self.pool(lane).waiting.lock().pop();
        if let Some(record) = own {
            return Some((record, lane));
        }
        if lane == Lane::Normal {
            let borrowed = self.priority.waiting.lock().pop();
            return borrowed.map(|record| (record, Lane::Priority));
        }
        None
    }

    fn record_audit(
        &self,
        task_id: TaskId,
        scope: &ScopeId,
        action: AuditAction,
        lane: Option<Lane>,
        detail: Option<String>,
    ) {
        if let Some(audit) = &self.audit {
            audit
                .lock()
                .record(build_audit_event(task_id, scope.clone(), action, lane, detail));
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("limits", &self.limits)
            .field("handlers", &self.handlers)
            .field("ticks", &self.current_tick())
            .finish_non_exhaustive()
    }
}

/// Run a handler operation, turning a panic into a handler fault.
fn guarded<T>(
    kind: TaskKind,
    operation: &str,
    f: impl FnOnce() -> Result<T, SchedulerError>,
) -> Result<T, SchedulerError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        Err(SchedulerError::Handler(format!(
            "{kind} {operation} panicked: {message}"
        )))
    })
}
