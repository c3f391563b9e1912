//! Tests for error types

use task_lanes::core::{SchedulerError, TaskKind};

#[test]
fn test_unknown_kind_error() {
    let err = SchedulerError::UnknownKind(TaskKind::Embedding);
    assert_eq!(format!("{err}"), "no handler registered for task kind EMBEDDING");
    assert!(err.is_submission_error());
}

#[test]
fn test_unknown_action_error() {
    let err = SchedulerError::UnknownAction("purge".to_string());
    assert_eq!(format!("{err}"), "unknown action: purge");
    assert!(err.is_submission_error());
}

#[test]
fn test_validation_error() {
    let err = SchedulerError::Validation("composite payload must not be empty".to_string());
    assert_eq!(format!("{err}"), "validation error: composite payload must not be empty");
}

#[test]
fn test_infrastructure_errors_are_not_submission_errors() {
    assert!(!SchedulerError::Store("disk full".into()).is_submission_error());
    assert!(!SchedulerError::Handler("boom".into()).is_submission_error());
    assert_eq!(
        format!("{}", SchedulerError::Store("disk full".into())),
        "store error: disk full"
    );
}
