use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Position in the job lifecycle (spec.md §3/§4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Leased,
    Done,
    Dead,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Dead)
    }
}

/// The sole first-class entity: a job and its full mutable state.
///
/// `state` is a plain discriminant rather than an enum carrying lease data,
/// because invariants 1-2 (spec.md §3) are phrased over independently
/// settable fields. The `start_lease`/`clear_lease` helpers below are the
/// only places allowed to touch `lease_owner`/`lease_expires_at` together
/// with `state`, so the invariant can't be violated by a partial update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub payload: Vec<u8>,
    pub state: JobState,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub lease_id: u64,
    pub attempts: u32,
    pub max_tries: u32,
    pub next_available_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: JobId, payload: Vec<u8>, max_tries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            payload,
            state: JobState::Queued,
            lease_owner: None,
            lease_expires_at: None,
            lease_id: 0,
            attempts: 0,
            max_tries,
            next_available_at: None,
            created_at: now,
        }
    }

    /// spec.md §4.C selection rule.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Queued
            && self.next_available_at.map(|t| t <= now).unwrap_or(true)
    }

    /// Issue a new lease. Bumps the fencing token (invariant 3).
    pub fn start_lease(&mut self, worker_id: String, expires_at: DateTime<Utc>) {
        self.state = JobState::Leased;
        self.lease_owner = Some(worker_id);
        self.lease_expires_at = Some(expires_at);
        self.lease_id += 1;
    }

    /// Clear lease fields, restoring invariant 2. Does not touch `state`.
    fn clear_lease(&mut self) {
        self.lease_owner = None;
        self.lease_expires_at = None;
    }

    pub fn mark_done(&mut self) {
        self.state = JobState::Done;
        self.clear_lease();
    }

    pub fn requeue_for_retry(&mut self, next_available_at: DateTime<Utc>) {
        self.state = JobState::Queued;
        self.clear_lease();
        self.next_available_at = Some(next_available_at);
    }

    pub fn mark_dead(&mut self) {
        self.state = JobState::Dead;
        self.clear_lease();
        self.next_available_at = None;
    }

    /// Re-queue after an expired lease (sweeper). Deliberately bypasses
    /// backoff: treated as immediately eligible, not as a failure.
    pub fn requeue_after_expiry(&mut self) {
        self.state = JobState::Queued;
        self.clear_lease();
        self.next_available_at = None;
    }
}
