//! Tests for audit sink

use task_lanes::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, Lane};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let task = uuid::Uuid::new_v4();

    sink.record(build_audit_event(task, "p1", AuditAction::Submit, None, None));
    sink.record(build_audit_event(task, "p1", AuditAction::Start, Some(Lane::Normal), None));

    let events = sink.events_for(task);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].action, AuditAction::Start);
    assert_eq!(events[1].lane, Some(Lane::Normal));
}

#[test]
fn test_zero_capacity_records_nothing() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(uuid::Uuid::new_v4(), "p1", AuditAction::Submit, None, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_build_audit_event() {
    let task = uuid::Uuid::new_v4();
    let event = build_audit_event(
        task,
        "p1",
        AuditAction::Execute,
        None,
        Some("remove_task".to_string()),
    );

    assert_eq!(event.task_id, task);
    assert_eq!(event.scope_id, "p1");
    assert_eq!(event.action.to_string(), "execute");
    assert_eq!(event.detail.as_deref(), Some("remove_task"));
    assert!(event.created_at_ms > 0);
}
