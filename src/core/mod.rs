//! Core scheduling abstractions: lanes, admission, reconciliation, and the
//! plugin seams handlers and backends implement.

pub mod actions;
pub mod audit;
pub mod composite;
pub mod error;
pub mod handler;
pub mod lanes;
pub mod notify;
pub mod scheduler;
pub mod scope;
pub mod spawn;
pub mod store;
pub mod task;

pub use actions::{ActionInvocation, ActionRegistry, FnAction, ImmediateAction, RemoveTaskAction, REMOVE_TASK_ACTION};
pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use composite::CompositeHandler;
pub use error::{AppResult, SchedulerError};
pub use handler::{HandlerContext, HandlerRegistry, TaskHandler};
pub use lanes::{ActiveSet, ActiveTask, LanePool, LaneSnapshot, WaitQueue};
pub use notify::{Notifier, TaskEvent, TracingNotifier};
pub use scheduler::{
    Admission, RecoveryReport, Scheduler, SchedulerLimits, SubmitReceipt, SubmitRequest, TickReport,
};
pub use scope::{AllScopes, ScopeDirectory};
pub use spawn::Spawn;
pub use store::TaskStore;
pub use task::{
    ActionRequest, CompositeProgress, CreatorId, KindClass, Lane, ScopeId, StoredTask,
    SubTaskDescriptor, TaskId, TaskKind, TaskPayload, TaskRecord,
};
