//! Tests for the tokio-driven reconciliation loop.

mod support;

use std::sync::Arc;
use std::time::Duration;

use support::harness;
use task_lanes::core::{Lane, TaskKind};
use task_lanes::runtime::{PollLoop, TokioSpawner};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_poll_loop_reconciles_until_shutdown() {
    let h = harness(1, 1);
    let n1 = h.submit(TaskKind::Gateway, false);
    let n2 = h.submit(TaskKind::Gateway, false);
    h.handler.finish(n1.id);
    h.handler.finish(n2.id);

    let handle = PollLoop::new(Arc::clone(&h.scheduler), Duration::from_millis(10))
        .spawn(&TokioSpawner::current());

    for _ in 0..100 {
        if h.store.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(h.store.is_empty());
    assert!(h.scheduler.snapshot(Lane::Normal).active.is_empty());

    handle.shutdown_and_wait().await;
    let stopped_at = h.scheduler.current_tick();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.scheduler.current_tick(), stopped_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropping_handle_stops_loop() {
    let h = harness(1, 1);
    let handle = PollLoop::new(Arc::clone(&h.scheduler), Duration::from_millis(5))
        .spawn(&TokioSpawner::current());
    tokio::time::sleep(Duration::from_millis(30)).await;
    drop(handle);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let after_drop = h.scheduler.current_tick();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.scheduler.current_tick(), after_drop);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_loops_shut_down_together() {
    let harnesses = [harness(1, 1), harness(1, 1)];
    let spawner = TokioSpawner::current();
    let handles: Vec<_> = harnesses
        .iter()
        .map(|h| PollLoop::new(Arc::clone(&h.scheduler), Duration::from_millis(5)).spawn(&spawner))
        .collect();

    tokio::time::sleep(Duration::from_millis(40)).await;
    futures::future::join_all(handles.into_iter().map(|handle| handle.shutdown_and_wait())).await;

    for h in &harnesses {
        assert!(h.scheduler.current_tick() > 0);
    }
}
