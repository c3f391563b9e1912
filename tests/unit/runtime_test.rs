//! Tests for tokio spawner utilities and API models

use serde_json::json;
use task_lanes::builders::SchedulerBuilder;
use task_lanes::config::SchedulerConfig;
use task_lanes::core::{Admission, Lane, Spawn, SubmitRequest, TaskKind};
use task_lanes::runtime::api::{health, lane_snapshots, remove_task, submit_task, RemovalRequest};
use task_lanes::runtime::tokio_spawner::TokioSpawner;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_submission_response_serializes_position() {
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default()).build().unwrap();
    let request: SubmitRequest = serde_json::from_value(json!({
        "scope_id": "p1",
        "kind": "TASK_QUEUE_ACTION",
        "creator_id": "u1",
        "payload": {"action": "remove_task", "task_id": uuid::Uuid::nil().to_string()}
    }))
    .unwrap();
    assert!(!request.priority);

    let response = submit_task(&scheduler, request).unwrap();
    assert_eq!(response.admission, Admission::Executed);
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["queue_position"], serde_json::Value::Null);
    assert_eq!(value["admission"]["state"], "executed");
}

#[test]
fn test_api_errors_are_rendered() {
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default()).build().unwrap();
    let err = submit_task(
        &scheduler,
        SubmitRequest::new("p1", "u1", TaskKind::Gateway, json!({})),
    )
    .unwrap_err();
    assert!(err.contains("GATEWAY"));

    let removed = remove_task(
        &scheduler,
        &RemovalRequest {
            scope_id: "p1".into(),
            task_id: uuid::Uuid::new_v4(),
        },
    )
    .unwrap();
    assert!(!removed);
}

#[test]
fn test_lane_listing_and_health() {
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default()).build().unwrap();
    scheduler.tick();

    let lanes = lane_snapshots(&scheduler);
    assert_eq!(lanes.iter().map(|l| l.lane).collect::<Vec<_>>(), vec![Lane::Priority, Lane::Normal]);
    let health = health(&scheduler);
    assert!(health.ok);
    assert_eq!(health.tick, 1);
}
