//! # Task Lanes
//!
//! A two-lane task admission and completion-polling scheduler for
//! multi-tenant backends.
//!
//! Work submitted to the scheduler is driven by an opaque external side
//! effect (an HTTP call, a background computation, a file operation).
//! Completion is reconciled by polling rather than callbacks, concurrency is
//! bounded per lane, and a durable store lets several process replicas share
//! one backlog and recover it after a restart.
//!
//! ## Key Features
//!
//! - **Two Lanes**: priority and normal, each with its own ceiling, FIFO wait
//!   queue and active set; priority work may borrow idle normal capacity
//! - **Completion Polling**: one reconciliation tick per period polls running
//!   tasks and refills freed slots
//! - **Composite Tasks**: a task expanding into a sequential chain of
//!   sub-tasks with progress notifications
//! - **Immediate Actions**: effects executed synchronously inside `submit`
//! - **Crash Recovery**: claims are cleared and the backlog re-admitted on start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use task_lanes::builders::SchedulerBuilder;
//! use task_lanes::config::SchedulerConfig;
//! use task_lanes::core::{SubmitRequest, TaskKind};
//! use task_lanes::runtime::{PollLoop, TokioSpawner};
//!
//! let config = SchedulerConfig::from_env()?;
//! let scheduler = SchedulerBuilder::new(config.clone())
//!     .handler(TaskKind::Embedding, Arc::new(EmbeddingHandler::new()))
//!     .build()?;
//! scheduler.recover()?;
//!
//! let poll_loop = PollLoop::new(Arc::clone(&scheduler), config.tick_interval())
//!     .spawn(&TokioSpawner::current());
//!
//! let receipt = scheduler.submit(
//!     SubmitRequest::new("project-1", "user-7", TaskKind::Embedding, serde_json::json!({}))
//!         .with_priority(true),
//! )?;
//! println!("queue position: {:?}", receipt.queue_position());
//!
//! poll_loop.shutdown_and_wait().await;
//! ```
//!
//! For complete examples, see `tests/lane_scenarios_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: lanes, admission, and reconciliation.
pub mod core;
/// Configuration models for lanes, ticking, and store backends.
pub mod config;
/// Builders to construct the scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for stores, notifications, and scope lookups.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
