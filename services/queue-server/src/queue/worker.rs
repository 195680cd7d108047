//! Scheduler background worker.
//!
//! Runs the assignment cycle on a periodic interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::Scheduler;

/// Periodic driver for [`Scheduler::run_cycle`].
pub struct SchedulerWorker {
    scheduler: Arc<Scheduler>,
    interval: Duration,
}

impl SchedulerWorker {
    pub fn new(scheduler: Arc<Scheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// Run the worker until shutdown is signaled.
    ///
    /// A failed tick is logged and the loop continues; the sweep self-heals
    /// on the next interval.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting scheduler worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Don't immediately tick on startup - wait for first interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.scheduler.run_cycle().await {
                        error!(error = %e, "Scheduling cycle failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scheduler worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
