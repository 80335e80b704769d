use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::scheduler::Scheduler;
use crate::store::JobStore;
use crate::types::JobState;

/// Periodic background task that re-queues jobs whose lease has expired
/// (spec.md §4.D). Runs once per `sweep_interval`.
pub struct LeaseSweeper {
    store: Arc<JobStore>,
    scheduler: Arc<Scheduler>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
}

impl LeaseSweeper {
    pub fn new(
        store: Arc<JobStore>,
        scheduler: Arc<Scheduler>,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            scheduler,
            clock,
            sweep_interval,
        }
    }

    /// Run the sweeper loop forever. Intended to be `tokio::spawn`ed.
    pub async fn run(self) {
        let mut ticker = interval(self.sweep_interval);
        info!(target: "dispatchd::events", interval_secs = self.sweep_interval.as_secs(), "lease sweeper started");
        loop {
            ticker.tick().await;
            let reclaimed = self.sweep_once();
            if reclaimed > 0 {
                info!(target: "dispatchd::events", event = "lease_expired", count = reclaimed, "reclaimed expired leases");
            } else {
                debug!(target: "dispatchd::events", "sweep found nothing expired");
            }
        }
    }

    /// Run exactly one sweep pass. Exposed for tests that want to drive
    /// sweeping deterministically instead of waiting on the interval.
    pub fn sweep_once(&self) -> usize {
        let now = self.clock.now();
        let reclaimed = self.store.with_write(|jobs| {
            let mut count = 0usize;
            for record in jobs.values_mut() {
                let expired = record.state == JobState::Leased
                    && record.lease_expires_at.map(|t| t <= now).unwrap_or(false);
                if expired {
                    record.requeue_after_expiry();
                    count += 1;
                }
            }
            count
        });

        if reclaimed > 0 {
            self.scheduler.notify_waiters();
        }
        reclaimed
    }
}
