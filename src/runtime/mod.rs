//! Runtime adapters and API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod poll_loop;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{health, lane_snapshots, remove_task, submit_task, Health, RemovalRequest, SubmissionResponse};
#[cfg(feature = "tokio-runtime")]
pub use poll_loop::{PollLoop, PollLoopHandle};
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;
