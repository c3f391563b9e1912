//! Configuration models for lanes, ticking, and store backends.

pub mod scheduler;

pub use scheduler::{LaneConfig, SchedulerConfig, StoreBackendConfig};
