//! Integration tests for composite task expansion.

mod support;

use serde_json::{json, Value};
use support::{harness, Harness};
use task_lanes::core::{
    Admission, Lane, StoredTask, SubmitRequest, TaskEvent, TaskId, TaskKind, TaskStore,
};

fn submit_composite(h: &Harness, scope: &str, descriptors: Value) -> TaskId {
    let receipt = h
        .scheduler
        .submit(SubmitRequest::new(scope, "tester", TaskKind::TaskQueue, descriptors))
        .unwrap();
    assert!(matches!(receipt.admission, Admission::Started { .. }));
    receipt.id
}

fn children(h: &Harness, scope: &str) -> Vec<TaskId> {
    h.notifier
        .events(scope)
        .into_iter()
        .filter_map(|e| match e {
            TaskEvent::SubTaskStarted { child, .. } => Some(child),
            _ => None,
        })
        .collect()
}

/// Tick until the composite record is gone, finishing every sub-task as soon
/// as it starts. Returns the last payload persisted before completion.
fn drive_to_completion(h: &Harness, composite: TaskId) -> Value {
    let mut last_payload = Value::Null;
    for _ in 0..60 {
        h.scheduler.tick();
        for child in h.handler.started() {
            h.handler.finish(child);
        }
        match h.store.fetch(composite).unwrap() {
            Some(StoredTask { payload, .. }) => last_payload = payload,
            None => return last_payload,
        }
    }
    panic!("composite {composite} did not complete");
}

#[test]
fn test_composite_emits_progress_per_subtask_then_done() {
    let h = harness(2, 4);
    let composite = submit_composite(
        &h,
        "p1",
        json!([{"kind": "TOKENIZATION"}, {"kind": "EMBEDDING"}, {"kind": "GATEWAY"}]),
    );

    let last_payload = drive_to_completion(&h, composite);
    assert_eq!(last_payload["done_count"], json!(3));
    assert_eq!(last_payload["initial_count"], json!(3));

    let events = h.notifier.events("p1");
    let fractions: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            TaskEvent::Progress { fraction, .. } => Some(*fraction),
            _ => None,
        })
        .collect();
    assert_eq!(fractions, vec![0.3333, 0.6667, 1.0]);
    assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    assert!(events.last().unwrap().is_done());
    assert!(events.iter().all(|e| e.task() == composite));
    assert_eq!(children(&h, "p1").len(), 3);

    let texts = h.notifier.texts("p1");
    assert_eq!(texts.len(), 4);
    assert!(texts.iter().all(|t| !t.contains(":started:")));
    assert_eq!(texts.last().unwrap(), &format!("task:{composite}:state:DONE"));
    assert!(!h.scheduler.is_tracked(composite).unwrap());
}

#[test]
fn test_subtasks_run_one_at_a_time_in_order() {
    let h = harness(2, 4);
    let composite = submit_composite(
        &h,
        "p1",
        json!([{"kind": "FILE_OPERATION"}, {"kind": "TOKENIZATION"}]),
    );

    h.scheduler.tick();
    let first = children(&h, "p1");
    assert_eq!(first.len(), 1);
    let stored = h.store.fetch(first[0]).unwrap().unwrap();
    assert_eq!(stored.kind, TaskKind::FileOperation);
    assert_eq!(stored.creator_id, "tester");

    // The sub-task is still running: no further expansion.
    h.scheduler.tick();
    h.scheduler.tick();
    assert_eq!(children(&h, "p1").len(), 1);

    drive_to_completion(&h, composite);
    let all = children(&h, "p1");
    assert_eq!(all.len(), 2);
    assert!(h.handler.started().starts_with(&all));
}

#[test]
fn test_orphaned_composite_completes_without_further_events() {
    let h = harness(2, 4);
    let composite = submit_composite(
        &h,
        "p1",
        json!([{"kind": "TOKENIZATION"}, {"kind": "EMBEDDING"}, {"kind": "GATEWAY"}]),
    );
    h.scheduler.tick();
    let emitted = h.notifier.events("p1").len();

    assert!(h.scopes.remove("p1"));
    let report = h.scheduler.tick();

    assert!(report.completed >= 1);
    assert!(h.store.fetch(composite).unwrap().is_none());
    assert!(!h.scheduler.snapshot(Lane::Normal).active.contains(&composite));
    assert_eq!(h.notifier.events("p1").len(), emitted);
}

#[test]
fn test_composite_in_missing_scope_is_not_started() {
    let h = harness(2, 4);
    let receipt = h
        .scheduler
        .submit(SubmitRequest::new("ghost", "tester", TaskKind::TaskQueue, json!([{"kind": "GATEWAY"}])))
        .unwrap();
    assert_eq!(receipt.admission, Admission::Dropped);
}

#[test]
fn test_zero_shot_information_source_runs_in_normal_lane() {
    let h = harness(2, 4);
    let composite = submit_composite(
        &h,
        "p1",
        json!([
            {"kind": "INFORMATION_SOURCE", "zero_shot": true},
            {"kind": "INFORMATION_SOURCE"},
            {"kind": "ATTRIBUTE_CALCULATION"}
        ]),
    );

    let mut lanes = Vec::new();
    for _ in 0..30 {
        h.scheduler.tick();
        for child in children(&h, "p1") {
            if lanes.iter().any(|(id, _)| *id == child) {
                continue;
            }
            let lane = if h.scheduler.snapshot(Lane::Priority).active.contains(&child) {
                Lane::Priority
            } else {
                Lane::Normal
            };
            lanes.push((child, lane));
            h.handler.finish(child);
        }
        if h.store.fetch(composite).unwrap().is_none() {
            break;
        }
    }

    let lanes: Vec<_> = lanes.into_iter().map(|(_, lane)| lane).collect();
    assert_eq!(lanes, vec![Lane::Normal, Lane::Priority, Lane::Priority]);
}

#[test]
fn test_descriptor_scope_override() {
    let h = harness(2, 4);
    submit_composite(&h, "p1", json!([{"kind": "GATEWAY", "scope_id": "p2"}]));
    h.scheduler.tick();

    let child = children(&h, "p1")[0];
    assert_eq!(h.store.fetch(child).unwrap().unwrap().scope_id, "p2");
}

#[test]
fn test_rejected_subtask_is_skipped_and_counted() {
    let h = harness(2, 4);
    let composite = submit_composite(
        &h,
        "p1",
        json!([
            {"kind": "TASK_QUEUE", "payload": []},
            {"kind": "GATEWAY"}
        ]),
    );

    let last_payload = drive_to_completion(&h, composite);
    assert_eq!(last_payload["done_count"], json!(2));

    let events = h.notifier.events("p1");
    assert_eq!(events.iter().filter(|e| e.is_progress()).count(), 2);
    assert_eq!(children(&h, "p1").len(), 1);
}

#[test]
fn test_composite_removed_while_running_completes() {
    let h = harness(2, 4);
    let composite = submit_composite(&h, "p1", json!([{"kind": "GATEWAY"}, {"kind": "GATEWAY"}]));
    h.scheduler.tick();

    assert!(h.scheduler.remove(&"p1".to_string(), composite).unwrap());
    h.scheduler.tick();
    assert!(!h.scheduler.is_tracked(composite).unwrap());
}
