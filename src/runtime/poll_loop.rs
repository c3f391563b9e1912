//! Periodic reconciliation loop.
//!
//! One loop per scheduler. Each period it runs [`Scheduler::tick`]; the loop
//! stops when [`PollLoopHandle::shutdown`] is called or the handle is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::core::{Scheduler, Spawn};

/// Drives a scheduler's ticks on a runtime.
#[derive(Debug)]
pub struct PollLoop {
    scheduler: Arc<Scheduler>,
    period: Duration,
}

impl PollLoop {
    /// Loop ticking `scheduler` every `period`.
    #[must_use]
    pub fn new(scheduler: Arc<Scheduler>, period: Duration) -> Self {
        Self { scheduler, period }
    }

    /// Start the loop. The first tick runs one period after spawning.
    pub fn spawn<S: Spawn>(self, spawner: &S) -> PollLoopHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let Self { scheduler, period } = self;

        spawner.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period = ?period, "poll loop started");

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let report = scheduler.tick();
                        if report.fault.is_some() {
                            warn!(tick = report.tick, "tick finished with a fault");
                        }
                    }
                }
            }

            info!(ticks = scheduler.current_tick(), "poll loop stopped");
            let _ = stopped_tx.send(());
        });

        PollLoopHandle {
            shutdown: shutdown_tx,
            stopped: stopped_rx,
        }
    }
}

/// Control handle of a running poll loop.
#[derive(Debug)]
pub struct PollLoopHandle {
    shutdown: watch::Sender<bool>,
    stopped: oneshot::Receiver<()>,
}

impl PollLoopHandle {
    /// Ask the loop to stop after the current tick.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Stop the loop and wait until it has exited.
    pub async fn shutdown_and_wait(self) {
        self.shutdown();
        let _ = self.stopped.await;
    }
}
