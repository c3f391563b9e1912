//! Tests for configuration validation

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use task_lanes::config::{LaneConfig, SchedulerConfig, StoreBackendConfig};

#[test]
fn test_defaults_are_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.tick_interval(), Duration::from_secs(1));
    assert_eq!(config.session_refresh_ticks, 120);
    assert_eq!(config.store, StoreBackendConfig::InMemory);
}

#[test]
fn test_zero_ceiling_rejected() {
    let config = SchedulerConfig {
        normal: LaneConfig::new(0),
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_refresh_period_rejected() {
    let config = SchedulerConfig {
        session_refresh_ticks: 0,
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "priority": {"max_active": 1},
        "normal": {"max_active": 2},
        "store": {"kind": "file", "path": "/var/lib/lanes"}
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.limits().priority_max, 1);
    assert_eq!(config.limits().normal_max, 2);
    assert_eq!(config.tick_interval_ms, 1000);
    assert_eq!(
        config.store,
        StoreBackendConfig::File {
            path: PathBuf::from("/var/lib/lanes"),
            stream: "tasks".into(),
        }
    );
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    let json = r#"{"priority": {"max_active": 0}, "normal": {"max_active": 2}}"#;
    assert!(SchedulerConfig::from_json_str(json).is_err());
    assert!(SchedulerConfig::from_json_str("{").is_err());
}

#[test]
fn test_environment_overrides() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("TASK_LANES_PRIORITY_MAX", "3"),
        ("TASK_LANES_NORMAL_MAX", " 5 "),
        ("TASK_LANES_TICK_MS", "250"),
        ("TASK_LANES_STORE_PATH", "/tmp/lanes"),
    ]);
    let config = SchedulerConfig::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap();

    assert_eq!(config.priority.max_active, 3);
    assert_eq!(config.normal.max_active, 5);
    assert_eq!(config.tick_interval(), Duration::from_millis(250));
    assert!(matches!(config.store, StoreBackendConfig::File { .. }));
}

#[test]
fn test_environment_parse_error_names_variable() {
    let err = SchedulerConfig::from_lookup(|name| {
        (name == "TASK_LANES_NORMAL_MAX").then(|| "many".to_string())
    })
    .unwrap_err();
    assert!(err.to_string().contains("TASK_LANES_NORMAL_MAX"));
}
