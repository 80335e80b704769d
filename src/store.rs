use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{BrokerError, BrokerResult};
use crate::types::{JobId, JobRecord};

/// Authoritative in-memory mapping from job id to job record. The sole
/// mutator of job state (spec.md §4.A). Guarded by a single lock shared,
/// by convention, with the `Notify` the Scheduler waits on — no operation
/// here ever awaits while holding the guard.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precondition: `job.id` not already present.
    pub fn insert(&self, job: JobRecord) {
        let mut guard = self.jobs.write();
        debug_assert!(
            !guard.contains_key(&job.id),
            "insert of a job id that already exists"
        );
        guard.insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.read().get(id).cloned()
    }

    /// Run `f` against the record while the store is locked, atomically.
    /// `f` returns whatever the caller wants to observe plus the result of
    /// a precondition/validation that may reject the mutation.
    pub fn update_with<T>(
        &self,
        id: &JobId,
        f: impl FnOnce(&mut JobRecord) -> BrokerResult<T>,
    ) -> BrokerResult<T> {
        let mut guard = self.jobs.write();
        let record = guard.get_mut(id).ok_or(BrokerError::NotFound)?;
        f(record)
    }

    /// Read-only snapshot of all records matching `filter`, for inspection
    /// endpoints (`list_all`, `list_dead`).
    pub fn snapshot(&self, filter: impl Fn(&JobRecord) -> bool) -> Vec<JobRecord> {
        self.jobs
            .read()
            .values()
            .filter(|r| filter(r))
            .cloned()
            .collect()
    }

    /// Acquire the write lock and hand the caller a closure-based view for
    /// operations that need to scan and then mutate within one critical
    /// section (poll's selection, the sweeper's pass). The guard never
    /// survives past this call; callers must not retain an `.await` inside
    /// `f`.
    pub fn with_write<T>(&self, f: impl FnOnce(&mut HashMap<JobId, JobRecord>) -> T) -> T {
        let mut guard = self.jobs.write();
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(id: &str) -> JobRecord {
        JobRecord::new(JobId::from(id), b"payload".to_vec(), 3, Utc::now())
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = JobStore::new();
        store.insert(sample("a"));
        let record = store.get(&JobId::from("a")).unwrap();
        assert_eq!(record.id, JobId::from("a"));
        assert_eq!(record.payload, b"payload");
    }

    #[test]
    fn get_missing_is_none() {
        let store = JobStore::new();
        assert!(store.get(&JobId::from("missing")).is_none());
    }

    #[test]
    fn update_with_missing_id_is_not_found() {
        let store = JobStore::new();
        let result = store.update_with(&JobId::from("missing"), |_| Ok(()));
        assert_eq!(result, Err(BrokerError::NotFound));
    }

    #[test]
    fn snapshot_filters() {
        let store = JobStore::new();
        store.insert(sample("a"));
        store.insert(sample("b"));
        store.update_with(&JobId::from("a"), |r| {
            r.mark_dead();
            Ok(())
        })
        .unwrap();

        let dead = store.snapshot(|r| r.state == crate::types::JobState::Dead);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, JobId::from("a"));

        let all = store.snapshot(|_| true);
        assert_eq!(all.len(), 2);
    }
}
