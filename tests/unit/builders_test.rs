//! Tests for builder modules

use task_lanes::builders::{build_store, SchedulerBuilder};
use task_lanes::config::{LaneConfig, SchedulerConfig, StoreBackendConfig};
use task_lanes::core::{Lane, SchedulerError, TaskKind, TaskStore};

#[test]
fn test_builder_applies_lane_ceilings() {
    let config = SchedulerConfig {
        priority: LaneConfig::new(3),
        normal: LaneConfig::new(7),
        ..SchedulerConfig::default()
    };
    let scheduler = SchedulerBuilder::new(config).build().unwrap();

    assert_eq!(scheduler.snapshot(Lane::Priority).max_active, 3);
    assert_eq!(scheduler.snapshot(Lane::Normal).max_active, 7);
    assert!(scheduler.handlers().contains(TaskKind::TaskQueue));
}

#[test]
fn test_builder_rejects_invalid_config() {
    let config = SchedulerConfig {
        tick_interval_ms: 0,
        ..SchedulerConfig::default()
    };
    let err = SchedulerBuilder::new(config).build().unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
}

#[test]
fn test_build_store_from_config() {
    let store = build_store(&StoreBackendConfig::InMemory).unwrap();
    assert!(store.list().unwrap().is_empty());

    let dir = std::env::temp_dir().join(format!("task_lanes_builder_{}", uuid::Uuid::new_v4()));
    let file_store = build_store(&StoreBackendConfig::File {
        path: dir.clone(),
        stream: "b".into(),
    });
    assert!(file_store.is_ok());
    let _ = std::fs::remove_dir_all(dir);
}
