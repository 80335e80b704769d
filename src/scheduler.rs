use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{BrokerError, BrokerResult};
use crate::jitter::JitterSource;
use crate::retry::retry_delay_with;
use crate::store::JobStore;
use crate::types::{JobId, JobRecord, JobState};

/// Selects an eligible job on a poll, issues leases, validates
/// acknowledge/fail, and wakes long-poll waiters (spec.md §4.C). The sole
/// issuer of leases.
pub struct Scheduler {
    store: Arc<JobStore>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
    notify: Notify,
    lease_duration: ChronoDuration,
    retry_base_secs: i64,
    retry_cap_secs: i64,
}

impl Scheduler {
    pub fn new(
        store: Arc<JobStore>,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn JitterSource>,
        lease_duration: ChronoDuration,
        retry_base_secs: i64,
        retry_cap_secs: i64,
    ) -> Self {
        Self {
            store,
            clock,
            jitter,
            notify: Notify::new(),
            lease_duration,
            retry_base_secs,
            retry_cap_secs,
        }
    }

    /// spec.md §5 wake-up discipline: one new QUEUED job wakes one waiter.
    pub fn notify_one(&self) {
        self.notify.notify_one();
    }

    /// spec.md §4.D: a sweeper pass that re-queued anything broadcasts.
    pub fn notify_waiters(&self) {
        self.notify.notify_waiters();
    }

    /// Long-polling lease acquisition. Scans under the store lock; if no
    /// job is eligible, enables the waiter *while the lock is still held*
    /// (`Notified::enable`, called from inside the `with_write` closure) so
    /// no enqueue/requeue/sweep that races with releasing the lock can be
    /// missed, then waits bounded by `deadline`. Every wake-up, spurious or
    /// not, re-scans under the lock.
    pub async fn poll(&self, worker_id: &str, deadline: Instant) -> BrokerResult<JobRecord> {
        if worker_id.is_empty() {
            return Err(BrokerError::MalformedRequest("worker_id must not be empty".into()));
        }

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            let now = self.clock.now();
            let lease_duration = self.lease_duration;
            let leased = self.store.with_write(|jobs| {
                let eligible_id = jobs
                    .values()
                    .find(|r| r.is_eligible(now))
                    .map(|r| r.id.clone());

                match eligible_id {
                    Some(id) => {
                        let record = jobs.get_mut(&id).expect("scanned id must exist");
                        record.start_lease(worker_id.to_string(), now + lease_duration);
                        Some(record.clone())
                    }
                    // Enable the waiter before the store lock is released:
                    // a notify_one/notify_waiters racing with that release
                    // is still guaranteed to reach us, since notify_waiters
                    // is a broadcast that stores no permit for a future that
                    // hasn't been enabled/polled yet.
                    None => {
                        notified.as_mut().enable();
                        None
                    }
                }
            });

            if let Some(record) = leased {
                info!(
                    target: "dispatchd::events",
                    event = "leased",
                    job_id = %record.id,
                    worker_id,
                    lease_id = record.lease_id,
                    "job leased"
                );
                return Ok(record);
            }

            tokio::select! {
                _ = notified => continue,
                _ = tokio::time::sleep_until(deadline) => return Err(BrokerError::NoJobAvailable),
            }
        }
    }

    /// Commit successful processing. Ack is idempotent against itself.
    pub fn ack(&self, worker_id: &str, job_id: &JobId, lease_id: u64) -> BrokerResult<()> {
        let now = self.clock.now();
        let result = self.store.update_with(job_id, |record| {
            if record.state == JobState::Done {
                return Ok(());
            }
            validate_lease_holder(record, worker_id, lease_id, now)?;
            record.mark_done();
            Ok(())
        });

        match &result {
            Ok(()) => info!(
                target: "dispatchd::events",
                event = "acked",
                job_id = %job_id,
                worker_id,
                lease_id,
                "job acked"
            ),
            Err(BrokerError::Conflict(reason)) => warn!(
                target: "dispatchd::events",
                event = "ack_rejected",
                job_id = %job_id,
                worker_id,
                lease_id,
                reason,
                "ack rejected"
            ),
            _ => {}
        }
        result
    }

    /// Worker reports failure: schedule a retry with full-jitter backoff,
    /// or transition to DEAD if the retry budget is exhausted.
    pub fn fail(&self, worker_id: &str, job_id: &JobId, lease_id: u64) -> BrokerResult<()> {
        let now = self.clock.now();
        let retry_base_secs = self.retry_base_secs;
        let retry_cap_secs = self.retry_cap_secs;
        let jitter = &*self.jitter;

        let outcome = self.store.update_with(job_id, |record| {
            if record.state == JobState::Done {
                return Ok(None);
            }
            validate_lease_holder(record, worker_id, lease_id, now)?;

            record.attempts += 1;
            if record.attempts >= record.max_tries {
                record.mark_dead();
                Ok(Some(Outcome::Dead))
            } else {
                let delay = retry_delay_with(record.attempts, retry_base_secs, retry_cap_secs, jitter);
                let next_available_at = now + ChronoDuration::from_std(delay).unwrap_or_default();
                record.requeue_for_retry(next_available_at);
                Ok(Some(Outcome::Retrying { next_available_at }))
            }
        })?;

        match outcome {
            Some(Outcome::Dead) => {
                warn!(
                    target: "dispatchd::events",
                    event = "dead",
                    job_id = %job_id,
                    worker_id,
                    lease_id,
                    "job moved to dead letter"
                );
            }
            Some(Outcome::Retrying { next_available_at }) => {
                info!(
                    target: "dispatchd::events",
                    event = "retry_scheduled",
                    job_id = %job_id,
                    worker_id,
                    lease_id,
                    next_available_at = %next_available_at,
                    "job requeued for retry"
                );
                self.notify_one();
            }
            None => {
                // Idempotent-against-DONE path: no event, mirrors ack.
            }
        }

        Ok(())
    }
}

enum Outcome {
    Dead,
    Retrying {
        next_available_at: chrono::DateTime<chrono::Utc>,
    },
}

/// Shared validation for ack/fail, in the exact order spec.md §4.C lists:
/// not the current holder -> Conflict, stale token -> Conflict, expired ->
/// Conflict. NotFound and the DONE short-circuit are handled by the
/// caller before this runs.
fn validate_lease_holder(
    record: &JobRecord,
    worker_id: &str,
    lease_id: u64,
    now: chrono::DateTime<chrono::Utc>,
) -> BrokerResult<()> {
    if record.state != JobState::Leased || record.lease_owner.as_deref() != Some(worker_id) {
        return Err(BrokerError::Conflict("not current lease holder"));
    }
    if record.lease_id != lease_id {
        return Err(BrokerError::Conflict("stale fencing token"));
    }
    match record.lease_expires_at {
        Some(expires_at) if expires_at > now => Ok(()),
        _ => Err(BrokerError::Conflict("lease expired")),
    }
}
