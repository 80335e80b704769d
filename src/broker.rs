use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration as ChronoDuration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};
use crate::idempotency::{IdempotencyRegistry, Reservation};
use crate::jitter::{JitterSource, ThreadRngJitter};
use crate::scheduler::Scheduler;
use crate::store::JobStore;
use crate::sweeper::LeaseSweeper;
use crate::types::{JobId, JobRecord, JobState};

/// Payload size bound (ambient defensive limit, not mandated by spec.md).
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// The coordinator object gluing the Job Store, Idempotency Registry,
/// Scheduler, and Lease Sweeper into the single serialization domain
/// Design Notes §9 requires ("process-wide mutable maps ... must be
/// placed behind a single coordinator"). Every external operation in
/// spec.md §6 is a method here.
pub struct Broker {
    store: Arc<JobStore>,
    idempotency: Arc<IdempotencyRegistry>,
    scheduler: Arc<Scheduler>,
    clock: Arc<dyn Clock>,
    config: BrokerConfig,
}

impl Broker {
    /// Production broker: system clock, thread-local jitter.
    pub fn new(config: BrokerConfig) -> Arc<Self> {
        Self::with_clock_and_jitter(config, Arc::new(SystemClock), Arc::new(ThreadRngJitter))
    }

    /// Construct with injected clock/jitter, for deterministic tests.
    pub fn with_clock_and_jitter(
        config: BrokerConfig,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn JitterSource>,
    ) -> Arc<Self> {
        let store = Arc::new(JobStore::new());
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            clock.clone(),
            jitter,
            ChronoDuration::from_std(config.lease_duration).unwrap_or_default(),
            config.retry_base.as_secs() as i64,
            config.retry_cap.as_secs() as i64,
        ));
        Arc::new(Self {
            store,
            idempotency: Arc::new(IdempotencyRegistry::new()),
            scheduler,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Spawn the lease sweeper as a background task. Returns the handle
    /// so the caller (typically `main`) can hold it for the process
    /// lifetime; dropping it does not stop the task (it is detached by
    /// `tokio::spawn`), but keeping the handle lets tests `.abort()` it.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let sweeper = LeaseSweeper::new(
            self.store.clone(),
            self.scheduler.clone(),
            self.clock.clone(),
            self.config.sweep_interval,
        );
        tokio::spawn(sweeper.run())
    }

    /// Build a sweeper the caller drives manually (tests: `sweep_once()`).
    pub fn sweeper(&self) -> LeaseSweeper {
        LeaseSweeper::new(
            self.store.clone(),
            self.scheduler.clone(),
            self.clock.clone(),
            self.config.sweep_interval,
        )
    }

    pub fn health(&self) -> &'static str {
        "ok"
    }

    /// Idempotent enqueue with atomic reserve-and-commit semantics
    /// (spec.md §4.B). Enqueue without a key skips the registry entirely.
    pub fn enqueue(&self, payload: Vec<u8>, idempotency_key: Option<String>) -> BrokerResult<JobId> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(BrokerError::MalformedRequest(format!(
                "payload too large: {} bytes (max {})",
                payload.len(),
                MAX_PAYLOAD_BYTES
            )));
        }

        if let Some(key) = idempotency_key.as_deref() {
            match self.idempotency.reserve(key) {
                Reservation::Committed(existing) => return Ok(existing),
                Reservation::InFlight => {
                    return Err(BrokerError::Conflict("idempotency key reservation in flight"))
                }
                Reservation::Fresh => {}
            }
        }

        // Nothing further to validate: the payload is opaque bytes. If a
        // richer façade added schema validation, a failure here would call
        // `self.idempotency.release(key)` before returning, per the
        // contract in spec.md §4.B step 2.

        let id = JobId::new();
        let now = self.clock.now();
        let job = JobRecord::new(id.clone(), payload, self.config.max_tries, now);
        self.store.insert(job);

        if let Some(key) = idempotency_key.as_deref() {
            self.idempotency.commit(key, id.clone());
        }

        self.scheduler.notify_one();
        info!(target: "dispatchd::events", event = "enqueued", job_id = %id, "job enqueued");
        Ok(id)
    }

    /// Long-polling lease acquisition, bounded by `timeout` from now.
    pub async fn poll(&self, worker_id: &str, timeout: StdDuration) -> BrokerResult<JobRecord> {
        let deadline = Instant::now() + timeout;
        self.scheduler.poll(worker_id, deadline).await
    }

    pub fn ack(&self, worker_id: &str, job_id: &JobId, lease_id: u64) -> BrokerResult<()> {
        if worker_id.is_empty() {
            return Err(BrokerError::MalformedRequest("worker_id must not be empty".into()));
        }
        self.scheduler.ack(worker_id, job_id, lease_id)
    }

    pub fn fail(&self, worker_id: &str, job_id: &JobId, lease_id: u64) -> BrokerResult<()> {
        if worker_id.is_empty() {
            return Err(BrokerError::MalformedRequest("worker_id must not be empty".into()));
        }
        self.scheduler.fail(worker_id, job_id, lease_id)
    }

    pub fn list_all(&self) -> Vec<JobRecord> {
        self.store.snapshot(|_| true)
    }

    pub fn list_dead(&self) -> Vec<JobRecord> {
        self.store.snapshot(|r| r.state == JobState::Dead)
    }

    pub fn get(&self, job_id: &JobId) -> BrokerResult<JobRecord> {
        self.store.get(job_id).ok_or(BrokerError::NotFound)
    }
}
